use std::path::PathBuf;

use daybook::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let profile = Error::InvalidProfileName {
        name: "2026-01-01".to_string(),
        reason: "looks like a date".to_string(),
    };
    assert_eq!(profile.exit_code(), exit_codes::USER_ERROR);

    let op = Error::OperationFailed("boom".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);

    let lock = Error::LockFailed(PathBuf::from("/tmp/store.json.lock"));
    assert_eq!(lock.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code_and_details() {
    let err = Error::ProfileNotFound("Work".to_string());
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("Profile not found"));

    let details = err.details().expect("details");
    assert_eq!(details["profile"], "Work");
}

#[test]
fn transition_error_names_status_and_action() {
    let err = Error::InvalidTransition {
        from: "done".to_string(),
        action: "pause".to_string(),
    };
    assert_eq!(err.to_string(), "Cannot pause a task that is done");
}
