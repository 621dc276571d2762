//! External service integrations.

pub mod gemini_client {
    pub use crate::gemini_client::*;
}

pub mod circuit_breaker {
    pub use crate::circuit_breaker::*;
}

pub mod identity {
    pub use crate::identity::*;
}
