//! Benchmarks for bit-plane transpose throughput.

use srpack_core::bitplane::{deinterleave, interleave};

fn main() {
    let test_cases = vec![
        ("small_random", generate_random(4 * 1024)),
        ("large_random", generate_random(4 * 1024 * 1024)),
        ("small_clock", generate_clock(4 * 1024)),
        ("large_clock", generate_clock(4 * 1024 * 1024)),
    ];

    println!("Bit-plane Transpose Benchmarks");
    println!("==============================\n");

    for (name, data) in &test_cases {
        println!("Test: {} ({} bytes)", name, data.len());

        for unitsize in [1usize, 2] {
            let all: Vec<usize> = (1..=unitsize * 8).collect();

            let start = std::time::Instant::now();
            let planes = deinterleave(data, unitsize, &all).expect("deinterleave");
            let split = start.elapsed();

            let start = std::time::Instant::now();
            let merged = interleave(&planes, unitsize).expect("interleave");
            let merge = start.elapsed();

            let mb = data.len() as f64 / 1024.0 / 1024.0;
            println!(
                "  unitsize {}: split {:7.2} MB/s, merge {:7.2} MB/s",
                unitsize,
                mb / split.as_secs_f64(),
                mb / merge.as_secs_f64()
            );

            // Sanity check
            assert_eq!(&merged[..data.len()], &data[..]);
        }
        println!();
    }
}

fn generate_random(size: usize) -> Vec<u8> {
    // Simple LCG random number generator
    let mut data = Vec::with_capacity(size);
    let mut state = 12345u64;
    for _ in 0..size {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((state >> 33) as u8);
    }
    data
}

fn generate_clock(size: usize) -> Vec<u8> {
    // Channel 1 toggles every sample, channel 2 every 4th, the rest idle
    (0..size)
        .map(|i| (i & 1) as u8 | (((i >> 2) & 1) as u8) << 1)
        .collect()
}
