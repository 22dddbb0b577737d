pub mod logging;
pub mod traits;

pub use tracing;

/// Process-wide lifecycle signal, broadcast to every serving component.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
