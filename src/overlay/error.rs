use std::fmt;

/// `S_OK`.
pub const STATUS_OK: i32 = 0;
/// `E_FAIL`.
pub const STATUS_FAIL: i32 = 0x8000_4005_u32 as i32;
/// `E_INVALIDARG`.
pub const STATUS_INVALID_ARG: i32 = 0x8007_0057_u32 as i32;
/// `E_POINTER`.
pub const STATUS_POINTER: i32 = 0x8000_4003_u32 as i32;
/// `E_UNEXPECTED`.
pub const STATUS_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;
/// `D2DERR_RECREATE_TARGET`.
pub const STATUS_RECREATE_TARGET: i32 = 0x8899_000C_u32 as i32;

/// Initialization step that produced an [`OverlayError::Initialization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Thread,
    Factory,
    Window,
    Placement,
    Show,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InitStage::Thread => "thread setup",
            InitStage::Factory => "factory creation",
            InitStage::Window => "window creation",
            InitStage::Placement => "window placement",
            InitStage::Show => "window show",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("overlay initialization failed during {stage}: {message}")]
    Initialization {
        stage: InitStage,
        code: i32,
        message: String,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("null overlay handle")]
    NullHandle,
    #[error("render target must be recreated")]
    DeviceLost,
    #[error("layered window update failed: {message}")]
    Composition { code: i32, message: String },
    #[error("render failed: {message}")]
    Render { code: i32, message: String },
    #[error("could not reach the overlay thread: {0}")]
    ThreadCommunication(String),
    #[error("overlay window is not running")]
    NotRunning,
    #[error("overlay event loop failed: {0}")]
    EventLoop(String),
    #[error("display configuration changed while the overlay was open")]
    DisplayChanged,
    #[error("overlay thread panicked: {0}")]
    ThreadPanicked(String),
}

impl OverlayError {
    pub fn init(stage: InitStage, message: impl Into<String>) -> Self {
        Self::Initialization {
            stage,
            code: STATUS_FAIL,
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            code: STATUS_FAIL,
            message: message.into(),
        }
    }

    pub fn composition(message: impl Into<String>) -> Self {
        Self::Composition {
            code: STATUS_FAIL,
            message: message.into(),
        }
    }

    /// HRESULT-style status code handed across the flat C surface.
    pub fn status_code(&self) -> i32 {
        match self {
            OverlayError::Initialization { code, .. }
            | OverlayError::Composition { code, .. }
            | OverlayError::Render { code, .. } => *code,
            OverlayError::InvalidArgument(_) => STATUS_INVALID_ARG,
            OverlayError::NullHandle => STATUS_POINTER,
            OverlayError::DeviceLost => STATUS_RECREATE_TARGET,
            OverlayError::ThreadPanicked(_) => STATUS_UNEXPECTED,
            OverlayError::ThreadCommunication(_)
            | OverlayError::NotRunning
            | OverlayError::EventLoop(_)
            | OverlayError::DisplayChanged => STATUS_FAIL,
        }
    }
}

pub type Result<T, E = OverlayError> = std::result::Result<T, E>;

pub fn status_of(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => STATUS_OK,
        Err(err) => err.status_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_hresult_values() {
        assert_eq!(STATUS_FAIL as u32, 0x8000_4005);
        assert_eq!(STATUS_INVALID_ARG as u32, 0x8007_0057);
        assert_eq!(OverlayError::NullHandle.status_code(), STATUS_POINTER);
        assert_eq!(OverlayError::NotRunning.status_code(), STATUS_FAIL);
        assert_eq!(
            OverlayError::DeviceLost.status_code(),
            STATUS_RECREATE_TARGET
        );
    }

    #[test]
    fn platform_codes_are_passed_through() {
        let err = OverlayError::Initialization {
            stage: InitStage::Window,
            code: 0x8007_0005_u32 as i32,
            message: "access denied".into(),
        };
        assert_eq!(err.status_code() as u32, 0x8007_0005);
        assert!(err.to_string().contains("window creation"));
        assert_eq!(status_of(&Err(err)), 0x8007_0005_u32 as i32);
        assert_eq!(status_of(&Ok(())), STATUS_OK);
    }
}
