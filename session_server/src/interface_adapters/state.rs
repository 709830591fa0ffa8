use crate::use_cases::{RoomRegistry, SessionAdmission};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Admission pipeline shared by every connection.
    pub admission: Arc<SessionAdmission>,
    // Same registry the admission pipeline seats players into.
    pub registry: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(admission: Arc<SessionAdmission>) -> Self {
        Self {
            registry: admission.registry().clone(),
            admission,
        }
    }
}
