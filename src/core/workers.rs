//! Render worker pool: fixed-cadence tree readers.
//!
//! One thread per render/audio lane. Each tick a worker takes the tree
//! read lock, recomputes world transforms into its own per-thread slots
//! and releases the lock before the tick ends — no permit is ever held
//! across ticks, so a pending structural mutation gets through between
//! any two ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::config::DEFAULT_TICK_MS;

use super::scene::Scene;

/// Handle to the running pool. Dropping it signals shutdown; `stop()`
/// additionally joins the threads.
pub struct RenderWorkers {
    shutdown: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl RenderWorkers {
    /// Leave a share of the cores to the UI/mutation thread.
    pub fn recommended_threads() -> usize {
        (num_cpus::get() * 3 / 4).max(1)
    }

    /// Start `num_threads` workers at the default tick rate.
    pub fn start(scene: &Scene, num_threads: usize) -> Self {
        Self::start_with_tick(scene, num_threads, Duration::from_millis(DEFAULT_TICK_MS))
    }

    /// Start workers with an explicit tick interval. Sizes the scene's
    /// per-thread storage to match the pool.
    pub fn start_with_tick(scene: &Scene, num_threads: usize, tick: Duration) -> Self {
        let num_threads = num_threads.max(1);
        scene.set_number_threads(num_threads);

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();
        for thread_id in 0..num_threads {
            let scene = scene.clone();
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("scena-worker-{}", thread_id))
                .spawn(move || {
                    debug!("worker {} started", thread_id);
                    let ticker = crossbeam::channel::tick(tick);
                    while ticker.recv().is_ok() {
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        scene.render_pass(thread_id);
                    }
                    debug!("worker {} stopped", thread_id);
                })
                .expect("Failed to spawn worker thread");
            handles.push(handle);
        }
        debug!("render workers initialized: {} threads", num_threads);

        Self { shutdown, handles }
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    /// Signal shutdown and wait for every worker to finish its tick.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for RenderWorkers {
    fn drop(&mut self) {
        // workers observe the flag on their next tick and exit
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::factory::ObjectRegistry;
    use crate::entities::keys::P_X;
    use crate::entities::params::ParamValue;
    use std::time::Instant;

    #[test]
    fn test_recommended_threads_positive() {
        assert!(RenderWorkers::recommended_threads() >= 1);
    }

    #[test]
    fn test_workers_compute_transforms() {
        let scene = Scene::new(Arc::new(ObjectRegistry::with_builtins()));
        let g = scene.add_object("Scene", "Group", None).unwrap();
        let t = scene.add_object(&g, "Translation", None).unwrap();
        scene
            .set_parameter_value(&t, P_X, ParamValue::Float(4.0))
            .unwrap();

        let workers = RenderWorkers::start_with_tick(&scene, 2, Duration::from_millis(1));
        assert_eq!(workers.num_threads(), 2);
        assert_eq!(scene.num_threads(), 2);

        // both lanes converge on the same world transform
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let done = (0..2).all(|lane| {
                scene
                    .transformation(&g, lane)
                    .map(|m| (m.transform_point3(glam::Vec3::ZERO).x - 4.0).abs() < 1e-5)
                    .unwrap_or(false)
            });
            if done {
                break;
            }
            assert!(Instant::now() < deadline, "workers never computed transforms");
            thread::sleep(Duration::from_millis(2));
        }

        // mutations interleave with running workers
        scene
            .set_parameter_value(&t, P_X, ParamValue::Float(9.0))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let m = scene.transformation(&g, 0).unwrap();
            if (m.transform_point3(glam::Vec3::ZERO).x - 9.0).abs() < 1e-5 {
                break;
            }
            assert!(Instant::now() < deadline, "workers never saw the new value");
            thread::sleep(Duration::from_millis(2));
        }

        workers.stop();
    }
}
