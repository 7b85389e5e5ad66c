use mirror_ring::MirroredRingBuffer;
use std::thread;

fn main() {
    // Map a ring of one page holding `u64` values
    let ring = MirroredRingBuffer::<u64>::new(4096).expect("failed to map ring");
    println!(
        "mapping: {:?} | length: {} bytes | capacity: {} elements",
        ring.mapping(),
        ring.byte_len(),
        ring.capacity()
    );

    // Hand the producing end to another thread
    let (mut producer, mut consumer) = ring.split();
    let writer = thread::spawn(move || {
        for i in 0..10_000u64 {
            while producer.deposit(&i).is_err() {
                thread::yield_now();
            }
        }
    });

    // Drain on this thread, the ring wraps many times
    let mut sum = 0;
    let mut received = 0;
    while received < 10_000 {
        match consumer.get() {
            Ok(value) => {
                sum += value;
                received += 1;
            }
            Err(_) => thread::yield_now(),
        }
    }
    writer.join().expect("producer panicked");

    println!("received: {} | sum: {}", received, sum);
}
