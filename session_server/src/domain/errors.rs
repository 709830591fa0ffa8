// Domain-level errors for admission, input validation and collaborators.

use std::fmt;

/// Why a connection was refused at admission time. Always terminal for the connection.
#[derive(Debug)]
pub enum AdmissionError {
    /// The connection-level token bucket was empty.
    RateLimited,
    /// The verifier could not be reached or answered with garbage.
    VerificationFailed,
    /// The verifier did not resolve the credential to an identity.
    InvalidCredential,
    /// The identity already holds a seat in some room.
    AlreadyConnected,
    /// The chosen room stopped before the player could be attached.
    RoomUnavailable,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::RateLimited => write!(f, "too many connections"),
            AdmissionError::VerificationFailed => write!(f, "token verification error"),
            AdmissionError::InvalidCredential => write!(f, "invalid token"),
            AdmissionError::AlreadyConnected => write!(f, "player already connected"),
            AdmissionError::RoomUnavailable => write!(f, "room unavailable"),
        }
    }
}

impl std::error::Error for AdmissionError {}

/// Rejected inbound input. Never terminal; the message is dropped.
#[derive(Debug)]
pub enum InputError {
    HeadingOutOfRange(f64),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::HeadingOutOfRange(degrees) => {
                write!(f, "heading {degrees} outside -180..=180")
            }
        }
    }
}

impl std::error::Error for InputError {}

#[derive(Debug)]
pub enum VerifyError {
    /// The verifier answered but did not resolve an identity.
    InvalidCredential,
    /// Transport, status or decode failure.
    Unavailable(String),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::InvalidCredential => write!(f, "credential not recognized"),
            VerifyError::Unavailable(reason) => write!(f, "verifier unavailable: {reason}"),
        }
    }
}

impl std::error::Error for VerifyError {}

#[derive(Debug)]
pub struct RewardsError(pub String);

impl fmt::Display for RewardsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rewards notification failed: {}", self.0)
    }
}

impl std::error::Error for RewardsError {}
