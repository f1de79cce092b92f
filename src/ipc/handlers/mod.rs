pub mod backup;
pub mod core;
pub mod exams;
pub mod nav;
pub mod notifications;
pub mod sections;
pub mod session;
pub mod settings;
pub mod staff;
pub mod students;
