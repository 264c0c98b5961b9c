pub mod pdf;
pub mod prescription;

pub use pdf::{render_prescription_pdf, PrescriptionDocument};
pub use prescription::PrescriptionService;
