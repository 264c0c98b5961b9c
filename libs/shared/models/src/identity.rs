use serde::{Deserialize, Serialize};

/// The resolved practitioner behind a request. Every scoped service call
/// takes one of these instead of reading identity from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorContext {
    pub doctor_id: i64,
    pub auth_user_id: String,
}

impl DoctorContext {
    pub fn new(doctor_id: i64, auth_user_id: impl Into<String>) -> Self {
        Self {
            doctor_id,
            auth_user_id: auth_user_id.into(),
        }
    }

    pub fn owns(&self, doctor_id: i64) -> bool {
        self.doctor_id == doctor_id
    }
}
