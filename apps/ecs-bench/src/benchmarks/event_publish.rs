use ecs_core::EventBus;
use std::hint::black_box;
use std::time::Instant;

#[derive(Copy, Clone)]
struct DamageEvent {
    target: u32,
    amount: u32,
}

pub fn run(events_per_tick: usize, ticks: usize) {
    println!("Running event publish/swap/consume throughput test...");
    println!("Events per tick: {events_per_tick}, ticks: {ticks}");

    let mut bus = EventBus::new();
    let start = Instant::now();

    for tick in 0..ticks {
        for i in 0..events_per_tick {
            bus.publish_plain(DamageEvent { target: i as u32, amount: tick as u32 });
        }
        bus.swap();
        black_box(bus.consume_plain::<DamageEvent>());
    }

    let elapsed = start.elapsed();
    let total_events = (events_per_tick * ticks) as f64;
    let events_per_sec = total_events / elapsed.as_secs_f64();

    println!("Results:");
    println!("  Total time: {elapsed:?}");
    println!("  Events per second: {events_per_sec:.2}");
}
