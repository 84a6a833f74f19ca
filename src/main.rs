// striped-pool demo binary - the actual library is in lib.rs

use std::time::Duration;

use striped_pool::{BoxError, Pool, PoolConfiguration};

fn main() {
    println!("=== striped-pool demo ===");

    let config = PoolConfiguration::new()
        .with_num_stripes(2)
        .with_max_per_stripe(4)
        .with_idle_timeout(Duration::from_secs(5));

    let pool = Pool::new(
        || Ok(String::with_capacity(256)),
        |_buffer| Ok(()),
        config,
    )
    .unwrap();

    let greeting = pool
        .with_resource(|buffer| {
            buffer.push_str("hello from the pool");
            Ok::<_, BoxError>(buffer.clone())
        })
        .unwrap();

    println!("  {greeting}");
    println!("  idle resources: {}", pool.idle_count());
    println!();
    println!("{}", pool.export_metrics_prometheus("demo", None));

    pool.close();
}
