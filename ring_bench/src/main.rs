use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use serde_derive::{Deserialize, Serialize};

use shmring::{Mpmc, RingBuffer, Spsc};

#[derive(clap::Parser)]
#[clap()]
struct Opts {
    #[clap(short = 'c', long = "config", default_value = "ring-bench.toml")]
    config: String,
    /// "produce" and "consume" run against the shared-memory ring from two
    /// processes; "pair" runs an in-process MPMC throughput loop.
    #[clap(short = 'r', long = "role", default_value = "pair")]
    role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BenchConfig {
    name: String,
    capacity: usize,
    messages: u64,
}

impl Default for BenchConfig {
    fn default() -> BenchConfig {
        BenchConfig {
            name: "/shmring-bench".to_string(),
            capacity: 1024,
            messages: 1_000_000,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let opts: Opts = Opts::parse();
    let cfg: BenchConfig = confy::load_path(&opts.config)?;
    match opts.role.as_str() {
        "produce" => produce(&cfg),
        "consume" => consume(&cfg),
        "pair" => pair(&cfg),
        other => Err(format!("unknown role: {}", other).into()),
    }
}

fn produce(cfg: &BenchConfig) -> Result<(), Box<dyn Error>> {
    let ring = RingBuffer::<Spsc, u64>::create_shm(&cfg.name, cfg.capacity)?;
    println!(
        "created {} (capacity {}), pushing {} messages",
        cfg.name,
        ring.capacity(),
        cfg.messages
    );
    let start = Instant::now();
    for value in 0..cfg.messages {
        while ring.push(value).is_err() {
            thread::yield_now();
        }
        if value % 500_000 == 0 {
            eprint!("\rpushed {} messages", value);
        }
    }
    report("pushed", cfg.messages, start);
    println!("leaving {} linked; unlink from the consumer side", cfg.name);
    Ok(())
}

fn consume(cfg: &BenchConfig) -> Result<(), Box<dyn Error>> {
    let ring = loop {
        match RingBuffer::<Spsc, u64>::attach_shm(&cfg.name) {
            Ok(ring) => break ring,
            Err(e) => {
                eprintln!("waiting for {}: {}", cfg.name, e);
                thread::sleep(Duration::from_millis(200));
            }
        }
    };
    println!("attached to {} (capacity {})", cfg.name, ring.capacity());
    let start = Instant::now();
    let mut expected = 0u64;
    while expected < cfg.messages {
        match ring.pop() {
            Ok(value) => {
                assert_eq!(value, expected, "sequence broke at {}", expected);
                expected += 1;
            }
            Err(_) => thread::yield_now(),
        }
    }
    report("popped", cfg.messages, start);
    shmring::shm_unlink(&cfg.name)?;
    println!("unlinked {}", cfg.name);
    Ok(())
}

fn pair(cfg: &BenchConfig) -> Result<(), Box<dyn Error>> {
    let ring = Arc::new(RingBuffer::<Mpmc, u64>::new(cfg.capacity));
    let messages = cfg.messages;
    println!(
        "in-process mpmc pair over capacity {}, {} messages",
        ring.capacity(),
        messages
    );

    let start = Instant::now();
    let producer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            for value in 0..messages {
                while ring.push(value).is_err() {
                    std::hint::spin_loop();
                }
            }
        })
    };
    let consumer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let mut received = 0u64;
            while received < messages {
                if ring.pop().is_ok() {
                    received += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
        })
    };
    producer.join().expect("producer thread panicked");
    consumer.join().expect("consumer thread panicked");
    report("transferred", messages, start);
    Ok(())
}

fn report(verb: &str, messages: u64, start: Instant) {
    let duration = start.elapsed();
    let iops = ((messages as f64) / (duration.as_millis().max(1) as f64)) * 1_000f64;
    println!(
        "\n{} {} messages, {:#?}K ops/s, total time: {:#?}",
        verb,
        messages,
        (iops / 1000f64) as u64,
        duration
    );
}
