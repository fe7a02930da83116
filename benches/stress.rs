use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};

use bookd::engine::{Engine, EngineError, FixedClock, ValidationError};
use bookd::model::*;
use bookd::store::WalStore;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    today().checked_add_days(Days::new(offset + 1)).unwrap()
}

struct Fixture {
    customer: Id,
    hotels: Vec<Id>,
}

async fn setup(engine: &Engine) -> Fixture {
    let customer = engine
        .register(NewReference::Customer(NewCustomer {
            first_name: "Bench".into(),
            last_name: "Mark".into(),
            email: "bench@example.com".into(),
            phone_number: "(212) 555-0100".into(),
        }))
        .await
        .unwrap()
        .id();

    let mut hotels = Vec::new();
    for i in 0..10 {
        let hotel = engine
            .register(NewReference::Hotel(NewHotel {
                name: "Bench".into(),
                phone_number: format!("(020) 0000-{i:04}"),
                postcode: format!("BN{i:04}"),
            }))
            .await
            .unwrap();
        hotels.push(hotel.id());
    }
    println!("  registered 1 customer, {} hotels", hotels.len());
    Fixture { customer, hotels }
}

fn stay(customer: Id, hotel: Id, on: NaiveDate) -> BookingCandidate {
    BookingCandidate::new(BookingKind::Hotel, customer, ResourceRefs::hotel(hotel), on)
}

async fn phase1_sequential(engine: &Engine, fx: &Fixture) {
    let n = 2_000u64;
    let mut latencies = Vec::with_capacity(n as usize);
    let start = Instant::now();
    for i in 0..n {
        let t = Instant::now();
        engine.create_booking(stay(fx.customer, fx.hotels[0], day(i))).await.unwrap();
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("create", &mut latencies);
}

async fn phase2_concurrent(engine: Arc<Engine>, fx: &Fixture) {
    let per_task = 500u64;
    let start = Instant::now();
    let mut handles = Vec::new();
    for &hotel in &fx.hotels[1..] {
        let engine = engine.clone();
        let customer = fx.customer;
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(per_task as usize);
            for i in 0..per_task {
                let t = Instant::now();
                engine.create_booking(stay(customer, hotel, day(i))).await.unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }
    let mut all = Vec::new();
    for h in handles {
        all.extend(h.await.unwrap());
    }
    let elapsed = start.elapsed();
    println!(
        "  {} bookings across {} hotels in {:.2}s = {:.0} ops/sec",
        all.len(),
        fx.hotels.len() - 1,
        elapsed.as_secs_f64(),
        all.len() as f64 / elapsed.as_secs_f64()
    );
    print_latency("create (parallel hotels)", &mut all);
}

/// Many writers race for the same few calendar days; exactly one per day wins.
async fn phase3_contention(engine: Arc<Engine>, fx: &Fixture) {
    let writers = 32;
    let days = 50u64;
    let hotel = fx.hotels[0];
    let base = 10_000;
    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..writers {
        let engine = engine.clone();
        let customer = fx.customer;
        handles.push(tokio::spawn(async move {
            let (mut won, mut lost) = (0u64, 0u64);
            for d in 0..days {
                match engine.create_booking(stay(customer, hotel, day(base + d))).await {
                    Ok(_) => won += 1,
                    Err(EngineError::Validation(ValidationError::DateConflict { .. })) => lost += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            (won, lost)
        }));
    }
    let (mut won, mut lost) = (0, 0);
    for h in handles {
        let (w, l) = h.await.unwrap();
        won += w;
        lost += l;
    }
    println!(
        "  {writers} writers x {days} days in {:.2}s: {won} booked, {lost} conflicts",
        start.elapsed().as_secs_f64()
    );
    assert_eq!(won, days, "double booking under contention");
}

async fn phase4_read_under_load(engine: Arc<Engine>, fx: &Fixture) {
    let writer = {
        let engine = engine.clone();
        let customer = fx.customer;
        let hotel = fx.hotels[1];
        tokio::spawn(async move {
            for i in 0..1_000 {
                let _ = engine.create_booking(stay(customer, hotel, day(20_000 + i))).await;
            }
        })
    };
    let mut latencies = Vec::new();
    for i in 0..2_000 {
        let hotel = fx.hotels[i % fx.hotels.len()];
        let t = Instant::now();
        engine.bookings_for_resource(BookingKind::Hotel, hotel).await.unwrap();
        latencies.push(t.elapsed());
    }
    writer.await.unwrap();
    print_latency("calendar read", &mut latencies);
}

#[tokio::main]
async fn main() {
    let dir = std::env::temp_dir().join(format!("bookd_bench_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let store = Arc::new(WalStore::open(dir.join("bookd.wal")).unwrap());
    let engine = Arc::new(Engine::new(store, Arc::new(FixedClock::new(today()))));

    println!("=== bookd stress benchmark ===");
    println!("wal: {}\n", dir.display());

    println!("[setup]");
    let fx = setup(&engine).await;

    println!("\n[phase 1] sequential write throughput");
    phase1_sequential(&engine, &fx).await;

    println!("\n[phase 2] concurrent write throughput");
    phase2_concurrent(engine.clone(), &fx).await;

    println!("\n[phase 3] same-day contention");
    phase3_contention(engine.clone(), &fx).await;

    println!("\n[phase 4] read latency under write load");
    phase4_read_under_load(engine.clone(), &fx).await;

    println!("\n=== benchmark complete ===");
    let _ = std::fs::remove_dir_all(&dir);
}
