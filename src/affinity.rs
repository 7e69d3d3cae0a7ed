//! CPU discovery and thread pinning.
//!
//! Linux only. Elsewhere pinning fails with an affinity error instead of
//! silently succeeding, and results are then run with `--no-pin`.

use crate::error::{FairnessError, FairnessResult};

/// Number of CPUs a `cpu_set_t` can describe.
#[cfg(target_os = "linux")]
pub const CPU_SET_CAPACITY: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

#[cfg(not(target_os = "linux"))]
pub const CPU_SET_CAPACITY: usize = 1024;

/// Logical CPUs this process may run on, in increasing order.
///
/// Honors taskset, cpusets and cgroup limits, so `taskset -c 0-3` restricts
/// the experiment to four workers.
#[cfg(target_os = "linux")]
pub fn allowed_cpus() -> FairnessResult<Vec<usize>> {
    // SAFETY: a zeroed cpu_set_t is a valid empty set, and sched_getaffinity
    // writes at most size_of::<cpu_set_t>() bytes into it.
    let set = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        let rc = libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut set);
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        set
    };

    // SAFETY: every index is below CPU_SET_CAPACITY
    let cpus: Vec<usize> = (0..CPU_SET_CAPACITY)
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
        .collect();

    if cpus.is_empty() {
        return Err(FairnessError::NoCpus);
    }
    Ok(cpus)
}

#[cfg(not(target_os = "linux"))]
pub fn allowed_cpus() -> FairnessResult<Vec<usize>> {
    let n = std::thread::available_parallelism()
        .map(|n| n.get())
        .map_err(|_| FairnessError::NoCpus)?;
    Ok((0..n).collect())
}

/// Pin the calling thread to `cpu`.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> FairnessResult<()> {
    if cpu >= CPU_SET_CAPACITY {
        return Err(FairnessError::Affinity {
            cpu,
            message: format!("exceeds CPU_SET_CAPACITY ({})", CPU_SET_CAPACITY),
        });
    }

    // SAFETY: cpu was bounds checked above; pthread_setaffinity_np returns
    // the error code directly instead of through errno.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        libc::pthread_setaffinity_np(
            libc::pthread_self(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &set,
        )
    };

    if rc != 0 {
        return Err(FairnessError::Affinity {
            cpu,
            message: std::io::Error::from_raw_os_error(rc).to_string(),
        });
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(cpu: usize) -> FairnessResult<()> {
    Err(FairnessError::Affinity {
        cpu,
        message: "CPU affinity is not supported on this platform".to_string(),
    })
}
