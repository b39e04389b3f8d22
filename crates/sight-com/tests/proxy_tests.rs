//! Integration tests for channel wiring through the proxy.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use sight_com::{
    ChannelTableDebug, HasSignals, HasSlots, Proxy, Signal, Signals, Slot, Slots, Worker,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses.
fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn test_channel_async_scenario() {
    init_tracing();
    let worker = Worker::new().expect("Failed to create worker");
    let proxy = Proxy::new();

    let sum_calls = Arc::new(AtomicUsize::new(0));
    let sum_total = Arc::new(AtomicI32::new(0));
    let square_calls = Arc::new(AtomicUsize::new(0));
    let nothing_calls = Arc::new(AtomicUsize::new(0));
    let text_calls = Arc::new(AtomicUsize::new(0));

    let sum = {
        let calls = sum_calls.clone();
        let total = sum_total.clone();
        Slot::with_worker(
            move |&(a, b): &(i32, i32)| {
                total.fetch_add(a + b, Ordering::SeqCst);
                calls.fetch_add(1, Ordering::SeqCst);
            },
            &worker,
        )
    };
    let square = {
        let calls = square_calls.clone();
        Slot::with_worker(
            move |&(a,): &(i32,)| {
                let _ = a * a;
                calls.fetch_add(1, Ordering::SeqCst);
            },
            &worker,
        )
    };
    let do_nothing = {
        let calls = nothing_calls.clone();
        Slot::with_worker(
            move |_: &()| {
                calls.fetch_add(1, Ordering::SeqCst);
            },
            &worker,
        )
    };
    let text = {
        let calls = text_calls.clone();
        Slot::with_worker(
            move |_: &(String,)| {
                calls.fetch_add(1, Ordering::SeqCst);
            },
            &worker,
        )
    };

    let sig = Signal::<(i32, i32)>::new();
    let sig2 = Signal::<(i32, i32, char)>::new();

    assert_eq!(proxy.connect_signal("channel1", &sig), 0);
    assert_eq!(proxy.connect_signal("channel1", &sig2), 0);
    assert_eq!(proxy.connect_slot("channel1", &sum), 2);
    assert_eq!(proxy.connect_slot("channel1", &square), 2);
    assert_eq!(proxy.connect_slot("channel1", &do_nothing), 2);
    assert_eq!(proxy.connect_slot("channel1", &text), 0);

    assert_eq!(sig.num_connections(), 3);
    assert_eq!(sig2.num_connections(), 3);
    assert_eq!(text.num_connections(), 0);

    sig.async_emit((3, 5));
    assert!(wait_until(Duration::from_secs(2), || {
        sum_calls.load(Ordering::SeqCst) == 1
            && square_calls.load(Ordering::SeqCst) == 1
            && nothing_calls.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(sum_total.load(Ordering::SeqCst), 8);

    sig2.async_emit((8, 2, 'x'));
    assert!(wait_until(Duration::from_secs(2), || {
        sum_calls.load(Ordering::SeqCst) == 2
            && square_calls.load(Ordering::SeqCst) == 2
            && nothing_calls.load(Ordering::SeqCst) == 2
    }));
    assert_eq!(sum_total.load(Ordering::SeqCst), 18);
    assert_eq!(text_calls.load(Ordering::SeqCst), 0);

    let dump = ChannelTableDebug::new(&proxy).to_string();
    assert!(dump.contains("channel1"));

    proxy.disconnect_signal("channel1", &sig);
    proxy.disconnect_signal("channel1", &sig2);
    proxy.disconnect_slot("channel1", &sum);
    proxy.disconnect_slot("channel1", &square);
    proxy.disconnect_slot("channel1", &do_nothing);
    proxy.disconnect_slot("channel1", &text);

    assert!(!proxy.has_channel("channel1"));
    assert_eq!(sig.num_connections(), 0);
    assert_eq!(sig2.num_connections(), 0);
    for count in [
        sum.num_connections(),
        square.num_connections(),
        do_nothing.num_connections(),
        text.num_connections(),
    ] {
        assert_eq!(count, 0);
    }

    worker.stop();
}

#[test]
fn test_two_channels_basic() {
    let proxy = Proxy::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let sig1 = Signal::<(i32,)>::new();
    let sig2 = Signal::<(i32,)>::new();
    let slot1 = {
        let calls = calls.clone();
        Slot::new(move |_: &(i32,)| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    let slot2 = {
        let calls = calls.clone();
        Slot::new(move |_: &(i32,)| {
            calls.fetch_add(10, Ordering::SeqCst);
        })
    };

    proxy.connect_signal("channel1", &sig1);
    proxy.connect_slot("channel1", &slot1);
    proxy.connect_signal("channel2", &sig2);
    proxy.connect_slot("channel2", &slot1);
    proxy.connect_slot("channel2", &slot2);

    assert_eq!(slot1.num_connections(), 2);
    assert_eq!(slot2.num_connections(), 1);

    sig1.emit((0,));
    sig2.emit((0,));
    assert_eq!(calls.load(Ordering::SeqCst), 12);

    proxy.disconnect_signal("channel1", &sig1);
    proxy.disconnect_slot("channel1", &slot1);
    proxy.disconnect_signal("channel2", &sig2);
    proxy.disconnect_slot("channel2", &slot1);
    proxy.disconnect_slot("channel2", &slot2);

    assert_eq!(sig1.num_connections(), 0);
    assert_eq!(sig2.num_connections(), 0);
    assert_eq!(slot1.num_connections(), 0);
    assert_eq!(slot2.num_connections(), 0);
    assert!(proxy.channels().is_empty());
}

#[test]
fn test_leaving_one_channel_keeps_the_other() {
    let proxy = Proxy::new();
    let worker = Worker::new().expect("Failed to create worker");
    let (sender, receiver) = crossbeam_channel::unbounded();
    let signal = Signal::<(i32,)>::new();
    let slot = Slot::with_worker(
        move |&(n,): &(i32,)| {
            sender.send(n).expect("receiver alive");
        },
        &worker,
    );

    for channel in ["channel1", "channel2"] {
        proxy.connect_signal(channel, &signal);
        proxy.connect_slot(channel, &slot);
    }
    assert!(proxy.disconnect_slot("channel1", &slot));
    assert_eq!(proxy.signal_count("channel2"), 1);
    assert_eq!(proxy.slot_count("channel2"), 1);

    assert_eq!(signal.async_emit((7,)), 1);
    assert_eq!(receiver.recv_timeout(Duration::from_secs(1)), Ok(7));
    worker.stop();
    assert!(receiver.try_recv().is_err());
    assert_eq!(slot.num_connections(), 1);

    proxy.disconnect_channel("channel2");
    assert_eq!(slot.num_connections(), 0);
}

struct Reader {
    signals: Signals,
}

impl HasSignals for Reader {
    fn signals(&self) -> &Signals {
        &self.signals
    }
}

struct Viewer {
    slots: Slots,
}

impl HasSlots for Viewer {
    fn slots(&self) -> &Slots {
        &self.slots
    }
}

#[test]
fn test_components_wired_by_key() {
    let worker = Worker::new().expect("Failed to create worker");
    let reader = Reader {
        signals: Signals::new(),
    };
    let viewer = Viewer {
        slots: Slots::new(),
    };

    let loaded = reader
        .signals
        .new_signal::<(String, usize)>("loaded")
        .expect("Failed to register signal");
    let (sender, receiver) = crossbeam_channel::unbounded();
    viewer
        .slots
        .new_slot("update", move |(path,): &(String,)| {
            sender.send(path.clone()).expect("receiver alive");
        })
        .expect("Failed to register slot");
    viewer.slots.set_worker(&worker);

    let proxy = Proxy::new();
    assert_eq!(proxy.connect_signal_key("data", &reader, "loaded"), Ok(0));
    assert_eq!(proxy.connect_slot_key("data", &viewer, "update"), Ok(1));

    loaded.async_emit(("image.nii".to_string(), 42));
    assert_eq!(
        receiver.recv_timeout(Duration::from_secs(1)),
        Ok("image.nii".to_string())
    );

    proxy.disconnect_channel("data");
    assert_eq!(loaded.num_connections(), 0);
    worker.stop();
}

#[test]
fn test_global_proxy_lifecycle() {
    let first = Proxy::global();
    let second = Proxy::global();
    assert!(Arc::ptr_eq(&first, &second));

    let signal = Signal::<()>::new();
    let slot = Slot::new(|_: &()| {});
    first.connect_signal("global-lifecycle", &signal);
    first.connect_slot("global-lifecycle", &slot);
    assert_eq!(slot.num_connections(), 1);

    Proxy::shutdown_global();
    assert_eq!(slot.num_connections(), 0);
    assert!(!first.has_channel("global-lifecycle"));

    let fresh = Proxy::global();
    assert!(!Arc::ptr_eq(&first, &fresh));
    Proxy::shutdown_global();
}

#[test]
fn test_concurrent_registration() {
    let proxy = Arc::new(Proxy::new());
    let signal = Signal::<(i32,)>::new();
    proxy.connect_signal("busy", &signal);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let proxy = proxy.clone();
            thread::spawn(move || {
                let slot = Slot::new(|_: &(i32,)| {});
                for _ in 0..25 {
                    assert_eq!(proxy.connect_slot("busy", &slot), 1);
                    assert!(proxy.disconnect_slot("busy", &slot));
                }
                slot.num_connections()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("thread panicked"), 0);
    }
    assert_eq!(signal.num_connections(), 0);
    assert_eq!(proxy.slot_count("busy"), 0);
}
