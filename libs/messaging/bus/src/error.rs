#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("Invalid subject '{0}'")]
    InvalidSubject(String),

    #[error("Delivery {message_id} already settled")]
    AlreadySettled { message_id: u64 },
}
