pub mod appointment;
pub mod availability;

pub use appointment::AppointmentService;
pub use availability::AvailabilityService;
