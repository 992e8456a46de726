/// Retries `$operation` for as long as it fails with an error matching `$network_error_predicate`,
/// sleeping between attempts and running `$reconnect` (if given) before the next one.
#[macro_export]
macro_rules! blocking_retry_on_network_failure {
    ($description:expr, $operation:expr, $network_error_predicate:expr $(, $reconnect:expr)? $(,)?) =>
        {
            $crate::retry_on_network_failure_impl!(
                $description,
                $operation,
                $network_error_predicate,
                std::thread::sleep(RETRY_INTERVAL)
                $(, $reconnect)?
            )
        }
}

#[macro_export]
macro_rules! retry_on_network_failure_impl {
    ($description:expr, $operation:expr, $network_error_predicate:expr, $sleep:expr $(, $reconnect:expr)? $(,)?) => {
        loop {
            match $operation {
                ok @ Ok(_) => break ok,
                Err(err) => {
                    if ($network_error_predicate)(&err) {
                        const RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
                        $crate::redo_types::log::error!(
                            "network error during {}: {err:?}. retrying in {RETRY_INTERVAL:?}...",
                            $description
                        );
                        $sleep;
                        $($reconnect)?
                    } else {
                        break Err(err);
                    }
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    #[derive(Debug)]
    enum TestError {
        Network,
        Fatal,
    }

    fn is_network(error: &TestError) -> bool {
        matches!(error, TestError::Network)
    }

    #[test]
    fn test_non_network_error_is_returned() {
        let mut attempts = 0;
        let result: Result<(), TestError> = crate::blocking_retry_on_network_failure!(
            "test",
            {
                attempts += 1;
                Err(TestError::Fatal)
            },
            is_network
        );
        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_success_is_returned() {
        let result: Result<u32, TestError> =
            crate::blocking_retry_on_network_failure!("test", Ok(7), is_network);
        assert_eq!(result.unwrap(), 7);
    }
}
