use std::fmt;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    /// The host has no default output device.
    NoDevice,
    /// No supported output configuration runs at exactly this rate.
    UnsupportedConfig { sample_rate: u32 },
    UnsupportedFormat(String),
    DeviceError(String),
    /// The audio backend reported a stream failure.
    StreamError(String),
    /// The device side of the sink has gone away.
    SinkClosed,
    /// A blocked write was abandoned because streaming was asked to stop.
    Interrupted,
    ConfigError(String),
    /// The control server could not listen on its address.
    BindError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "i/o error: {}", e),
            Error::NoDevice => write!(f, "no output device available"),
            Error::UnsupportedConfig { sample_rate } => {
                write!(f, "no output configuration supports {} Hz", sample_rate)
            }
            Error::UnsupportedFormat(format) => write!(f, "unsupported sample format: {}", format),
            Error::DeviceError(message) => write!(f, "audio device error: {}", message),
            Error::StreamError(message) => write!(f, "audio stream error: {}", message),
            Error::SinkClosed => write!(f, "audio sink closed"),
            Error::Interrupted => write!(f, "write interrupted by stop request"),
            Error::ConfigError(message) => write!(f, "invalid configuration: {}", message),
            Error::BindError(message) => write!(f, "cannot start control server: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::IoError(error)
    }
}

impl From<cpal::SupportedStreamConfigsError> for Error {
    fn from(error: cpal::SupportedStreamConfigsError) -> Error {
        Error::DeviceError(error.to_string())
    }
}

impl From<cpal::BuildStreamError> for Error {
    fn from(error: cpal::BuildStreamError) -> Error {
        Error::DeviceError(error.to_string())
    }
}

impl From<cpal::PlayStreamError> for Error {
    fn from(error: cpal::PlayStreamError) -> Error {
        Error::DeviceError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
