#[cfg(test)]
mod tests {
    use crate::local::Local;
    use hickory_proto::op::ResponseCode;
    use std::time::{Duration, Instant};

    #[test]
    fn test_local_default() {
        let local = Local::default();

        assert_eq!(local.rcode, None);
        assert!(local.time_elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_local_time_elapsed() {
        let local = Local::default();

        std::thread::sleep(Duration::from_millis(10));

        assert!(local.time_elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_local_rcode() {
        let now = Instant::now();
        let mut local = Local {
            time_started: now,
            rcode: None,
        };
        let untouched = local.clone();

        local.rcode = Some(ResponseCode::NXDomain);

        assert_ne!(local, untouched);
        assert_eq!(local.rcode, Some(ResponseCode::NXDomain));
    }
}
