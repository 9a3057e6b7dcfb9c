use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::serial::{CapturePort, NullPort};
use crate::shell::ShellCore;
use crate::thread::Identity;
use crate::ticker::Ticker;
use crate::time::Tick;
use crate::PIPE_END;

#[test]
fn spawn_switch_join_lifecycle() {
    let core = ShellCore::new(NullPort);
    assert!(!core.is_running());
    assert_eq!(core.which_is_running(), Identity::NotRunning);

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    core.spawn(move |c| {
        assert_eq!(c.which_is_running(), Identity::Foreground);
        flag.store(true, Ordering::Release);
    });
    assert!(core.is_running());
    assert_eq!(core.which_is_running(), Identity::Background);
    assert_eq!(core.switch_count(), 0);

    // One switch out, one switch back when the entry returns.
    core.switch();
    assert!(ran.load(Ordering::Acquire));
    assert_eq!(core.which_is_running(), Identity::Returned);
    assert_eq!(core.switch_count(), 2);
    assert!(core.is_running());

    core.join();
    assert!(!core.is_running());
    assert_eq!(core.which_is_running(), Identity::NotRunning);
}

#[test]
fn switch_after_return_is_pinned() {
    let core = ShellCore::new(NullPort);
    core.spawn(|_| {});
    core.switch();
    assert_eq!(core.which_is_running(), Identity::Returned);
    assert_eq!(core.switch_count(), 2);

    // Further switches advance the count but control stays here.
    core.switch();
    core.switch();
    assert_eq!(core.switch_count(), 4);
    assert_eq!(core.which_is_running(), Identity::Returned);

    core.join();
}

#[test]
fn pipe_carries_bytes_in_order_with_end_sentinel() {
    let core = ShellCore::new(NullPort);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let after_end = Arc::new(Mutex::new(None));

    let sink = seen.clone();
    let tail = after_end.clone();
    core.spawn(move |c| {
        let mut byte = c.recv_byte();
        while byte != PIPE_END {
            sink.lock().unwrap().push(byte);
            byte = c.recv_byte();
        }
        // The sentinel is sticky once the stream has ended.
        *tail.lock().unwrap() = Some(c.recv_byte());
    });

    // More than the pipe can hold at once, so the producer must block and
    // hand over mid-stream.
    let sent: Vec<u8> = (0..100).collect();
    core.send_all(&sent);
    core.join();

    assert_eq!(*seen.lock().unwrap(), sent);
    assert_eq!(*after_end.lock().unwrap(), Some(PIPE_END));
}

#[test]
fn consumer_output_reaches_hardware_port() {
    let core = ShellCore::new(CapturePort::new());
    core.spawn(|c| {
        let mut byte = c.recv_byte();
        while byte != PIPE_END {
            c.send_byte(byte.to_ascii_uppercase());
            byte = c.recv_byte();
        }
    });
    core.send_all(b"hello");
    core.join();
    assert_eq!(core.port().contents(), b"HELLO");
}

#[test]
fn send_goes_to_port_when_no_thread() {
    let core = ShellCore::new(CapturePort::new());
    core.send_all(b"hi");
    core.send_newline();
    assert_eq!(core.port().contents(), b"hi\r\n");
}

#[test]
fn recv_drains_rx_ring() {
    let core = ShellCore::new(NullPort);
    let feeder_core = core.clone();
    let feeder = std::thread::spawn(move || {
        for &b in b"ok!" {
            std::thread::sleep(Duration::from_millis(1));
            feeder_core.rx_isr(b);
        }
    });

    let got = [core.recv_byte(), core.recv_byte(), core.recv_byte()];
    feeder.join().unwrap();
    assert_eq!(&got, b"ok!");
}

#[test]
fn rx_byte_during_park_setup_wakes_the_reader() {
    // Sole event in the test: one rx interrupt, no tick heartbeat. A byte
    // landing between the reader's empty poll and its park must still wake
    // it rather than leave it parked over a non-empty ring.
    let core = ShellCore::new(NullPort);
    let reader_core = core.clone();
    let (tx, rx) = std::sync::mpsc::channel();
    let reader = std::thread::spawn(move || {
        tx.send(reader_core.recv_byte()).unwrap();
    });

    std::thread::sleep(Duration::from_millis(5));
    core.rx_isr(b'x');
    let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    reader.join().unwrap();
    assert_eq!(got, b'x');
}

#[test]
fn rx_interrupt_entropy_comes_from_the_clock() {
    let plain = ShellCore::new(NullPort);
    let recv_a = ShellCore::new(NullPort);
    let recv_b = ShellCore::new(NullPort);
    for core in [&plain, &recv_a, &recv_b] {
        core.tick_isr();
    }

    // Different byte values, same tick count: identical entropy.
    recv_a.rx_isr(0x00);
    recv_b.rx_isr(0xff);
    assert_eq!(recv_a.rng().rand(), recv_b.rng().rand());
    assert_ne!(plain.rng().rand(), recv_a.rng().rand());
}

#[test]
fn sleep_releases_wake_slots() {
    let core = ShellCore::new(NullPort);
    let ticker = Ticker::start(core.clone(), Duration::from_micros(50)).unwrap();

    core.sleep_seconds(1);
    core.sleep_seconds(2);
    assert_eq!(core.clock().registered_count(), 0);
    assert!(core.clock().now() >= Tick::new(0, 3 * 128));

    drop(ticker);
}

#[test]
fn sleep_polls_when_slots_are_exhausted() {
    let core = ShellCore::new(NullPort);
    // Pin all four slots on deadlines that never arrive in this test.
    let far = Tick::new(0xffff, 0);
    let held: Vec<_> = (0..4)
        .map(|_| core.clock().register_wake(far).unwrap())
        .collect();

    let ticker = Ticker::start(core.clone(), Duration::from_micros(50)).unwrap();
    core.sleep_seconds(1);

    assert!(core.clock().now() >= Tick::new(0, 128));
    assert_eq!(core.clock().registered_count(), held.len());
    drop(ticker);
}

#[test]
#[should_panic(expected = "spawn while a thread is live")]
fn spawn_twice_is_fatal() {
    let core = ShellCore::new(NullPort);
    core.spawn(|_| {});
    core.spawn(|_| {});
}

#[test]
#[should_panic(expected = "join with no thread running")]
fn join_without_thread_is_fatal() {
    let core = ShellCore::new(NullPort);
    core.join();
}

#[test]
#[should_panic(expected = "switch with no spare context")]
fn switch_without_thread_is_fatal() {
    let core = ShellCore::new(NullPort);
    core.switch();
}
