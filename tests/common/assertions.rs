//! Custom assertion macros and utilities
//!
//! Provides enhanced assertion macros for better test output and
//! more descriptive error messages.

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a string contains a substring
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        match (&$haystack, &$needle) {
            (haystack, needle) => assert!(
                haystack.contains(*needle),
                "Expected '{}' to contain '{}'",
                haystack,
                needle
            ),
        }
    };
}

/// Assert that a value is within a range
#[macro_export]
macro_rules! assert_in_range {
    ($value:expr, $min:expr, $max:expr) => {
        assert!(
            $value >= $min && $value <= $max,
            "Value {:?} is not in range [{:?}, {:?}]",
            $value,
            $min,
            $max
        );
    };
}

/// Wait for the next broadcast value, failing the test after two seconds
#[macro_export]
macro_rules! recv_within {
    ($receiver:expr) => {
        match tokio::time::timeout(std::time::Duration::from_secs(2), $receiver.recv()).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => panic!("Channel error: {:?}", e),
            Err(_) => panic!("Timed out waiting for a notification"),
        }
    };
}
