/// Judge0 status ids. 1 and 2 mean the job is still queued or running;
/// 3 is the accepted verdict; everything above 3 is a distinct rejection
/// reason (wrong answer, time limit, compile error, runtime error, ...)
/// that must reach the caller verbatim.
pub const STATUS_ACCEPTED: i32 = 3;

pub fn is_terminal(status_id: i32) -> bool {
    status_id > 2
}

pub fn is_accepted(status_id: i32) -> bool {
    status_id == STATUS_ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_and_processing_are_not_terminal() {
        assert!(!is_terminal(1));
        assert!(!is_terminal(2));
    }

    #[test]
    fn test_verdicts_are_terminal() {
        for id in 3..=14 {
            assert!(is_terminal(id));
        }
    }

    #[test]
    fn test_only_status_three_is_accepted() {
        assert!(is_accepted(3));
        assert!(!is_accepted(4));
        assert!(!is_accepted(2));
    }
}
