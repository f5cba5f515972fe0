//! `SER_*.txt` system-event log → [`LogFile`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use neolink_core::{LogFile, SerialNumber};

use crate::classify::serial_from_file_name;
use crate::error::ParseError;

/// Serial for an event log: the static configured one if set, otherwise the
/// one embedded in the file name.
pub fn resolve_log_serial(
    file_name: &str,
    static_serial: Option<&SerialNumber>,
) -> Result<SerialNumber, ParseError> {
    match static_serial {
        Some(serial) => Ok(serial.clone()),
        None => serial_from_file_name(file_name),
    }
}

/// Wrap the raw bytes of an event log into an upload payload.
///
/// An empty file fails validation (`Payload` is required) and is left for
/// a later cycle, when the instrument may have finished writing it.
pub fn build_log_file(
    file_name: &str,
    bytes: &[u8],
    serial_number: SerialNumber,
) -> Result<LogFile, ParseError> {
    let log = LogFile {
        serial_number,
        log_name: file_name.to_string(),
        payload: STANDARD.encode(bytes),
    };
    log.validate()?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_base64_of_file_bytes() {
        let log = build_log_file("SER_456def_1.txt", b"example", "456def".into()).expect("log");
        assert_eq!(log.payload, "ZXhhbXBsZQ==");
        assert_eq!(log.log_name, "SER_456def_1.txt");
    }

    #[test]
    fn empty_log_is_rejected() {
        let err = build_log_file("SER_456def_1.txt", b"", "456def".into()).unwrap_err();
        assert!(matches!(err, ParseError::Invalid(_)));
    }

    #[test]
    fn static_serial_wins_over_file_name() {
        let fixed = SerialNumber::from("CONFIGURED");
        let serial = resolve_log_serial("SER_456def_1.txt", Some(&fixed)).expect("serial");
        assert_eq!(serial, fixed);

        let derived = resolve_log_serial("SER_456def_1.txt", None).expect("serial");
        assert_eq!(derived.as_str(), "456def");
    }
}
