use crate::benchmarks;

/// Runs every benchmark with its default parameters, for a single
/// end-to-end pass over the whole core.
pub fn run_all_benchmarks() {
    benchmarks::chunk_commit::run(100_000);
    println!();
    benchmarks::query_enumerate::run(100_000, 100);
    println!();
    benchmarks::event_publish::run(10_000, 1_000);
    println!();
    benchmarks::frame_capture::run(50_000, 500, 60);
}
