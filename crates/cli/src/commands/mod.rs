pub mod parse;
pub mod sweep;
pub mod version;

use snapbench::{Configuration, FailurePolicy};

const MAX_CPUS: u32 = 256;
const MAX_MEMORY_MIB: u32 = 1024 * 1024; // 1 TiB

fn parse_cpus(s: &str) -> Result<u32, String> {
    let cpus: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if cpus == 0 {
        return Err("vcpus must be at least 1".to_string());
    }
    if cpus > MAX_CPUS {
        return Err(format!("vcpus cannot exceed {MAX_CPUS}"));
    }
    Ok(cpus)
}

fn parse_memory(s: &str) -> Result<u32, String> {
    let memory: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if memory == 0 {
        return Err("memory must be at least 1 MiB".to_string());
    }
    if memory > MAX_MEMORY_MIB {
        return Err(format!("memory cannot exceed {MAX_MEMORY_MIB} MiB"));
    }
    Ok(memory)
}

/// Parses `VCPUS:MEM_MIB`, e.g. `2:5307`.
fn parse_point(s: &str) -> Result<Configuration, String> {
    let (cpus, memory) = s
        .split_once(':')
        .ok_or_else(|| "configuration format must be 'vcpus:mem_mib'".to_string())?;
    let cpus = parse_cpus(cpus)?;
    let memory = parse_memory(memory)?;
    Configuration::new(cpus, memory).map_err(|e| e.to_string())
}

fn parse_failure_policy(s: &str) -> Result<FailurePolicy, String> {
    match s {
        "continue" => Ok(FailurePolicy::Continue),
        "abort" => Ok(FailurePolicy::Abort),
        other => Err(format!(
            "invalid failure policy '{other}', expected 'continue' or 'abort'"
        )),
    }
}
