//! Concurrent first-open tests: many callers racing to create the same channel

use std::{
    sync::{Arc, Barrier},
    thread,
};

use orbit::{MemoryTransport, Orb, Role, ShmTransport, TopicMetadata};
use tempfile::TempDir;

static VEHICLE_STATUS: TopicMetadata = TopicMetadata::new("vehicle_status", 16);

#[cfg(test)]
mod registration_race_tests {
    use super::*;

    /// Test: N concurrent advertisers create exactly one channel
    #[test]
    fn race_memory_advertisers_register_once() {
        let transport = MemoryTransport::new();
        let orb = Arc::new(Orb::new(transport.clone()));

        let thread_count = 8;
        let barrier = Arc::new(Barrier::new(thread_count));

        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let orb = orb.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    orb.open(&VEHICLE_STATUS, Role::Advertiser, 0, 0).unwrap()
                })
            })
            .collect();

        let advertisers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(transport.registrations(), 1);
        assert_eq!(transport.channel_count(), 1);
        assert_eq!(transport.open_channels(), thread_count);

        let mut probe = orb.subscribe(&VEHICLE_STATUS).unwrap();
        let raw = probe.raw_state().unwrap();
        assert_eq!(raw.nadvertisers as usize, thread_count);

        drop(advertisers);
        drop(probe);
        assert_eq!(transport.open_channels(), 0);
    }

    /// Test: mixed advertisers and subscribers racing on first open
    #[test]
    fn race_memory_mixed_roles() {
        let transport = MemoryTransport::new();
        let orb = Arc::new(Orb::new(transport.clone()));

        let thread_count = 6;
        let barrier = Arc::new(Barrier::new(thread_count));

        let handles: Vec<_> = (0..thread_count)
            .map(|i| {
                let orb = orb.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let role = if i % 2 == 0 { Role::Advertiser } else { Role::Subscriber };
                    barrier.wait();
                    orb.open(&VEHICLE_STATUS, role, 3, 0).unwrap()
                })
            })
            .collect();

        let mut opened: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(transport.registrations(), 1);
        assert_eq!(
            transport.identity("/dev/uorb/vehicle_status3"),
            Some(VEHICLE_STATUS.clone())
        );

        let state = opened[0].state().unwrap();
        assert_eq!(state.nsubscribers, 3);
    }

    /// Test: concurrent advertisers on the shared-memory transport
    #[test]
    fn race_shm_advertisers_register_once() {
        let temp_dir = TempDir::new().unwrap();
        let thread_count = 6;
        let barrier = Arc::new(Barrier::new(thread_count));

        // Separate transports model independent processes sharing one root
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let root = temp_dir.path().to_path_buf();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let orb = Orb::new(ShmTransport::new(root).unwrap());
                    barrier.wait();
                    let handle = orb.open(&VEHICLE_STATUS, Role::Advertiser, 0, 0).unwrap();
                    (orb, handle)
                })
            })
            .collect();

        let mut opened: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let transport = ShmTransport::new(temp_dir.path()).unwrap();
        assert_eq!(
            transport.list("/dev/uorb/").unwrap(),
            vec!["/dev/uorb/vehicle_status0".to_string()]
        );

        let raw = opened[0].1.raw_state().unwrap();
        assert_eq!(raw.nadvertisers as usize, thread_count);

        opened.truncate(1);
        let raw = opened[0].1.raw_state().unwrap();
        assert_eq!(raw.nadvertisers, 1);
    }
}
