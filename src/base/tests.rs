use crate::base::loadstate::LoadState;
use crate::base::neterror::{NetError, GENERIC_RESPONSE_ERROR};

#[test]
fn test_net_error_codes() {
    assert_eq!(NetError::ConnectionRefused.as_i32(), -102);
    assert_eq!(NetError::InvalidUrl("x".into()).as_i32(), -300);
    assert_eq!(NetError::ResponseStream("boom".into()).as_i32(), -355);
}

#[test]
fn test_transport_classification() {
    assert!(NetError::ConnectionTimedOut.is_transport());
    assert!(NetError::generic_transport().is_transport());
    assert!(!NetError::InvalidUrl("x".into()).is_transport());
    assert!(!NetError::response_stream(None).is_transport());
}

#[test]
fn test_generic_messages() {
    assert_eq!(
        NetError::generic_transport().to_string(),
        GENERIC_RESPONSE_ERROR
    );
    assert_eq!(
        NetError::response_stream(None).to_string(),
        GENERIC_RESPONSE_ERROR
    );
    assert_eq!(
        NetError::response_stream(Some(String::new())).to_string(),
        GENERIC_RESPONSE_ERROR
    );
    assert_eq!(
        NetError::response_stream(Some("socket hang up".into())).to_string(),
        "socket hang up"
    );
}

#[test]
fn test_io_error_mapping() {
    let err: NetError = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
    assert_eq!(err, NetError::ConnectionTimedOut);
}

#[test]
fn test_load_state_executing() {
    assert!(!LoadState::Idle.is_executing());
    assert!(LoadState::WaitingForResponse.is_executing());
    assert!(!LoadState::Settled.is_executing());
}
