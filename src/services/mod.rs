pub mod associations;
pub mod catalog;
pub mod image_registry;
pub mod persistence;
pub mod project;

// Re-export commonly used services
pub use associations::AssociationStore;
pub use catalog::GcpCatalog;
pub use image_registry::ImageRegistry;
pub use project::GcpProject;
