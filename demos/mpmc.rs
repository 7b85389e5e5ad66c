use mirror_ring::MirroredRingBuffer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const PRODUCERS: usize = 4;
const CONSUMERS: usize = 2;
const PER_PRODUCER: usize = 5_000;

fn main() {
    // Share one ring between every thread
    let ring = Arc::new(MirroredRingBuffer::<[u32; 2]>::new(4096).expect("failed to map ring"));
    let received = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let ring = ring.clone();
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    while ring.multi_deposit(&[id as u32, seq as u32]).is_err() {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let ring = ring.clone();
            let received = received.clone();
            thread::spawn(move || {
                let mut mine = 0;
                while received.load(Ordering::SeqCst) < PRODUCERS * PER_PRODUCER {
                    if ring.multi_get().is_ok() {
                        received.fetch_add(1, Ordering::SeqCst);
                        mine += 1;
                    } else {
                        thread::yield_now();
                    }
                }
                mine
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer panicked");
    }
    for (id, consumer) in consumers.into_iter().enumerate() {
        let count = consumer.join().expect("consumer panicked");
        println!("consumer {}: {} elements", id, count);
    }

    println!("total received: {}", received.load(Ordering::SeqCst));
}
