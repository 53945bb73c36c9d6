use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, Local, NaiveDate, Utc};
use rust_decimal::Decimal;

use agenda::archiver::archive_once;
use agenda::catalog::Catalog;
use agenda::engine::{Engine, EngineError};
use agenda::history::{History, HistoryStore};

fn bench_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("agenda_bench_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create bench dir");
    dir
}

fn open_engine(name: &str) -> Arc<Engine> {
    let path = bench_dir().join(name);
    let _ = std::fs::remove_file(&path);
    let engine = Engine::open(&path, Arc::new(Catalog::default()), Duration::from_secs(5))
        .expect("open engine");
    Arc::new(engine)
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
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
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn day(base: NaiveDate, offset: u64) -> String {
    (base + Days::new(offset)).format("%Y-%m-%d").to_string()
}

/// Every (day, slot) pair from `base`, in order.
fn slot_grid(base: NaiveDate, catalog: &Catalog, n: usize) -> Vec<(String, String)> {
    let slots = catalog.all_slots();
    (0..n)
        .map(|i| {
            let d = day(base, (i / slots.len()) as u64);
            (d, slots[i % slots.len()].to_string())
        })
        .collect()
}

async fn phase1_sequential(base: NaiveDate) {
    let engine = open_engine("sequential.wal");
    let grid = slot_grid(base, engine.catalog(), 2000);
    let mut latencies = Vec::with_capacity(grid.len());
    let start = Instant::now();

    for (i, (date, slot)) in grid.iter().enumerate() {
        let t = Instant::now();
        engine
            .create(&format!("client {i}"), date, slot, "Corte", Decimal::new(35, 0))
            .await
            .expect("sequential booking");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = grid.len() as f64 / elapsed.as_secs_f64();
    println!("  {} bookings in {:.2}s = {ops:.0} ops/sec", grid.len(), elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
    let _ = engine.close().await;
}

/// Many tasks race for the same small set of slots. Exactly one booking per
/// slot may win.
async fn phase2_contention(base: NaiveDate) {
    let engine = open_engine("contention.wal");
    let grid = Arc::new(slot_grid(base, engine.catalog(), 90));
    let n_tasks = 50;

    let wins = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();

    for t in 0..n_tasks {
        let engine = engine.clone();
        let grid = grid.clone();
        let wins = wins.clone();
        let conflicts = conflicts.clone();
        handles.push(tokio::spawn(async move {
            for (date, slot) in grid.iter() {
                match engine
                    .create(&format!("task {t}"), date, slot, "Barba", Decimal::new(25, 0))
                    .await
                {
                    Ok(_) => wins.fetch_add(1, Ordering::Relaxed),
                    Err(EngineError::Conflict { .. }) => conflicts.fetch_add(1, Ordering::Relaxed),
                    Err(e) => panic!("unexpected error: {e}"),
                };
            }
        }));
    }
    for h in handles {
        h.await.expect("contention task");
    }

    let elapsed = start.elapsed();
    let attempts = n_tasks * grid.len();
    let wins = wins.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} tasks x {} slots = {attempts} attempts in {:.2}s: {wins} booked, {} conflicts",
        grid.len(),
        elapsed.as_secs_f64(),
        conflicts.load(Ordering::Relaxed)
    );
    assert_eq!(wins, grid.len(), "double booking detected");
    assert_eq!(engine.active_count(), grid.len());
    let _ = engine.close().await;
}

async fn phase3_read_under_load(base: NaiveDate) {
    let engine = open_engine("read_under_load.wal");
    for (i, (date, slot)) in slot_grid(base, engine.catalog(), 200).iter().enumerate() {
        engine
            .create(&format!("seed {i}"), date, slot, "Corte", Decimal::new(35, 0))
            .await
            .expect("seed booking");
    }

    // Writers keep booking further out while readers query availability
    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for w in 0..5u64 {
        let engine = engine.clone();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let slots: Vec<String> = engine.catalog().all_slots().iter().map(|s| s.to_string()).collect();
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let date = day(base, 1000 + w * 10_000 + i / slots.len() as u64);
                let slot = &slots[(i as usize) % slots.len()];
                let _ = engine
                    .create("writer", &date, slot, "Corte", Decimal::new(35, 0))
                    .await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();
    for r in 0..n_readers {
        let engine = engine.clone();
        reader_handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let date = base + Days::new(((r * reads_per_reader + i) % 30) as u64);
                let t = Instant::now();
                let _ = engine.available_slots(date).await;
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.expect("reader task"));
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("availability query", &mut all_latencies);
    let _ = engine.close().await;
}

async fn phase4_archive_sweep(base: NaiveDate) {
    let engine = open_engine("archive.wal");
    let history_path = bench_dir().join("history.wal");
    let _ = std::fs::remove_file(&history_path);
    let history = History::open(&history_path).expect("open history");

    let n = 1000;
    for (i, (date, slot)) in slot_grid(base, engine.catalog(), n).iter().enumerate() {
        engine
            .create(&format!("old {i}"), date, slot, "Corte", Decimal::new(35, 0))
            .await
            .expect("seed booking");
    }

    let cutoff = base + Days::new(10_000);
    let start = Instant::now();
    let report = archive_once(&engine, &history, cutoff, Utc::now(), Duration::from_secs(5)).await;
    let elapsed = start.elapsed();

    println!(
        "  archived {}/{} in {:.2}s ({} failed), history now {}",
        report.archived,
        report.candidates,
        elapsed.as_secs_f64(),
        report.failed,
        history.len().await
    );

    let t = Instant::now();
    engine.compact().await.expect("compact");
    println!("  compaction after sweep: {:.2}ms", t.elapsed().as_secs_f64() * 1000.0);
    let _ = engine.close().await;
}

#[tokio::main]
async fn main() {
    let base = Local::now().date_naive();

    println!("=== agenda stress benchmark ===");
    println!("data: {}\n", bench_dir().display());

    println!("[phase 1] sequential booking throughput");
    phase1_sequential(base).await;

    println!("\n[phase 2] slot contention");
    phase2_contention(base).await;

    println!("\n[phase 3] availability latency under write load");
    phase3_read_under_load(base).await;

    println!("\n[phase 4] archive sweep");
    phase4_archive_sweep(base).await;

    let _ = std::fs::remove_dir_all(bench_dir());
    println!("\n=== done ===");
}
