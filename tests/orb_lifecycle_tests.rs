//! End-to-end tests for advertise/subscribe/publish/copy over the in-process transport

#[cfg(test)]
mod tests {
    use std::{
        io,
        thread,
        time::{Duration, Instant},
    };

    use orbit::{MemoryTransport, Orb, OrbError, Role, TopicMetadata, TopicState};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct SensorAccel {
        timestamp: u64,
        x: f32,
        y: f32,
        z: f32,
        temperature: f32,
    }

    orbit::orb_topic!(SENSOR_ACCEL, "sensor_accel", SensorAccel);

    fn encode(sample: &SensorAccel) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SENSOR_ACCEL.size());
        bytes.extend_from_slice(&sample.timestamp.to_ne_bytes());
        for v in [sample.x, sample.y, sample.z, sample.temperature] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        bytes
    }

    fn sample(timestamp: u64) -> SensorAccel {
        SensorAccel {
            timestamp,
            x: 0.1,
            y: -0.2,
            z: 9.81,
            temperature: 31.5,
        }
    }

    #[test]
    fn test_publish_copy_round_trip() {
        let orb = Orb::new(MemoryTransport::new());
        let payload = encode(&sample(orbit::monotonic_timestamp()));

        let mut advertiser = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        advertiser.publish_sample(&payload).unwrap();

        let mut subscriber = orb.subscribe(&SENSOR_ACCEL).unwrap();
        let mut buf = vec![0u8; SENSOR_ACCEL.size()];
        let read = subscriber.copy_out(&mut buf).unwrap();

        assert_eq!(read, SENSOR_ACCEL.size());
        assert_eq!(buf, payload);
    }

    #[test]
    fn test_initial_data_visible_to_late_subscriber() {
        let orb = Orb::new(MemoryTransport::new());
        let payload = encode(&sample(7));

        let _advertiser = orb.advertise(&SENSOR_ACCEL, Some(&payload[..])).unwrap();
        let mut subscriber = orb.subscribe(&SENSOR_ACCEL).unwrap();

        assert!(subscriber.check_updated().unwrap());
        let mut buf = vec![0u8; SENSOR_ACCEL.size()];
        subscriber.copy_sample(&mut buf).unwrap();
        assert_eq!(buf, payload);
        assert!(!subscriber.check_updated().unwrap());
    }

    #[test]
    fn test_generation_monotonicity() {
        let orb = Orb::new(MemoryTransport::new());
        let mut advertiser = orb.advertise_queue(&SENSOR_ACCEL, None, 4).unwrap();

        let before = advertiser.state().unwrap().generation;
        for i in 0..25 {
            advertiser.publish_sample(&encode(&sample(i))).unwrap();
        }
        let after = advertiser.state().unwrap().generation;

        assert_eq!(after, before + 25);
    }

    #[test]
    fn test_short_write_closes_handle() {
        let transport = MemoryTransport::new();
        let orb = Orb::new(transport.clone());

        transport.limit_writes(Some(8));
        let err = orb
            .advertise(&SENSOR_ACCEL, Some(&encode(&sample(1))[..]))
            .unwrap_err();

        match err {
            OrbError::ShortWrite {
                written, expected, ..
            } => {
                assert_eq!(written, 8);
                assert_eq!(expected, SENSOR_ACCEL.size());
            }
            other => panic!("expected short write, got {:?}", other),
        }

        // The half-initialized advertiser was released
        assert_eq!(transport.open_channels(), 0);
        assert!(!orb.exists(&SENSOR_ACCEL, 0).unwrap());
    }

    #[test]
    fn test_failed_initial_publish_closes_handle() {
        let transport = MemoryTransport::new();
        let orb = Orb::new(transport.clone());

        // The transport rejects a payload of the wrong element size
        let err = orb.advertise(&SENSOR_ACCEL, Some(&[0u8; 3][..])).unwrap_err();
        assert_eq!(err.kind(), Some(io::ErrorKind::InvalidInput));

        assert_eq!(transport.open_channels(), 0);
        assert!(!orb.exists(&SENSOR_ACCEL, 0).unwrap());
    }

    #[test]
    fn test_mismatched_sample_rejected_before_transport() {
        let orb = Orb::new(MemoryTransport::new());
        let mut advertiser = orb.advertise(&SENSOR_ACCEL, None).unwrap();

        let err = advertiser.publish_sample(&[0u8; 3]).unwrap_err();
        assert!(matches!(err, OrbError::InvalidParameter { .. }));
        assert_eq!(advertiser.state().unwrap().generation, 0);
    }

    #[test]
    fn test_check_updated_does_not_block() {
        let orb = Orb::new(MemoryTransport::new());
        let _advertiser = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        let mut subscriber = orb.subscribe(&SENSOR_ACCEL).unwrap();

        let start = Instant::now();
        let updated = subscriber.check_updated().unwrap();
        assert!(!updated);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_check_updated_does_not_consume() {
        let orb = Orb::new(MemoryTransport::new());
        let mut advertiser = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        let mut subscriber = orb.subscribe(&SENSOR_ACCEL).unwrap();

        advertiser.publish_sample(&encode(&sample(3))).unwrap();
        assert!(subscriber.check_updated().unwrap());
        assert!(subscriber.check_updated().unwrap());

        let mut buf = vec![0u8; SENSOR_ACCEL.size()];
        subscriber.copy_sample(&mut buf).unwrap();
        assert!(!subscriber.check_updated().unwrap());
    }

    #[test]
    fn test_copy_blocks_until_publish() {
        let orb = Orb::new(MemoryTransport::new());
        let mut advertiser = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        let mut subscriber = orb.subscribe(&SENSOR_ACCEL).unwrap();
        let payload = encode(&sample(99));

        let reader = thread::spawn(move || {
            let mut buf = vec![0u8; SENSOR_ACCEL.size()];
            subscriber.copy_sample(&mut buf).unwrap();
            buf
        });

        thread::sleep(Duration::from_millis(20));
        advertiser.publish_sample(&payload).unwrap();

        assert_eq!(reader.join().unwrap(), payload);
    }

    #[test]
    fn test_roles_are_exclusive() {
        let orb = Orb::new(MemoryTransport::new());
        let mut advertiser = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        let mut subscriber = orb.subscribe(&SENSOR_ACCEL).unwrap();

        assert_eq!(advertiser.role(), Role::Advertiser);
        let mut buf = vec![0u8; SENSOR_ACCEL.size()];
        let err = advertiser.copy_out(&mut buf).unwrap_err();
        assert_eq!(err.kind(), Some(io::ErrorKind::PermissionDenied));

        let err = subscriber.publish(&encode(&sample(0))).unwrap_err();
        assert_eq!(err.kind(), Some(io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn test_interval_and_state() {
        let orb = Orb::new(MemoryTransport::new());
        let _advertiser = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        let mut subscriber = orb.subscribe(&SENSOR_ACCEL).unwrap();

        subscriber.set_interval(50_000).unwrap();
        assert_eq!(subscriber.get_interval().unwrap(), 50_000);

        let mut state = TopicState::default();
        subscriber.get_state(Some(&mut state)).unwrap();
        assert_eq!(state.max_frequency, 20);
        assert_eq!(state.nsubscribers, 1);
    }

    #[test]
    fn test_exists_probe_leaves_nothing_open() {
        let transport = MemoryTransport::new();
        let orb = Orb::new(transport.clone());

        assert!(!orb.exists(&SENSOR_ACCEL, 0).unwrap());
        assert_eq!(transport.open_channels(), 0);
        assert_eq!(transport.channel_count(), 0);

        let advertiser = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        assert!(orb.exists(&SENSOR_ACCEL, 0).unwrap());
        assert_eq!(transport.open_channels(), 1);

        orb.unadvertise(advertiser).unwrap();
        assert!(!orb.exists(&SENSOR_ACCEL, 0).unwrap());
        assert_eq!(transport.open_channels(), 0);
    }

    #[test]
    fn test_group_count_follows_advertisers() {
        let orb = Orb::new(MemoryTransport::new());

        let first = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        let second = orb.advertise(&SENSOR_ACCEL, None).unwrap();
        let third = orb.advertise_multi(&SENSOR_ACCEL, None, 2).unwrap();
        assert_eq!(orb.group_count(&SENSOR_ACCEL).unwrap(), 3);

        orb.unadvertise(third).unwrap();
        assert_eq!(orb.group_count(&SENSOR_ACCEL).unwrap(), 2);

        // Instance 0 gone: enumeration stops immediately
        orb.unadvertise(first).unwrap();
        assert_eq!(orb.group_count(&SENSOR_ACCEL).unwrap(), 0);
        drop(second);
    }

    #[test]
    fn test_independent_instances() {
        let orb = Orb::new(MemoryTransport::new());
        let mut left = orb.advertise_multi(&SENSOR_ACCEL, None, 0).unwrap();
        let mut right = orb.advertise_multi(&SENSOR_ACCEL, None, 1).unwrap();
        let mut left_sub = orb.subscribe_multi(&SENSOR_ACCEL, 0).unwrap();
        let mut right_sub = orb.subscribe_multi(&SENSOR_ACCEL, 1).unwrap();

        left.publish_sample(&encode(&sample(10))).unwrap();
        assert!(left_sub.check_updated().unwrap());
        assert!(!right_sub.check_updated().unwrap());

        right.publish_sample(&encode(&sample(20))).unwrap();
        let mut buf = vec![0u8; SENSOR_ACCEL.size()];
        right_sub.copy_sample(&mut buf).unwrap();
        assert_eq!(buf, encode(&sample(20)));
        assert_eq!(right_sub.path().as_str(), "/dev/uorb/sensor_accel1");
    }
}
