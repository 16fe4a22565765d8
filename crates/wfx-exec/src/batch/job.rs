use std::fmt::Write as _;

use wfx_model::{Env, TaskResources};

use crate::error::SpecError;

/// Batch job description rendered into a submission script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub name: String,
    pub command: Vec<String>,
    pub work_dir: Option<String>,
    pub cpus: Option<u32>,
    pub memory_mb: Option<u64>,
    pub env: Env,
}

impl BatchJob {
    pub fn from_resources(res: &TaskResources) -> Result<Self, SpecError> {
        if res.name.trim().is_empty() {
            return Err(SpecError::MissingName);
        }
        if res.command.first().is_none_or(|c| c.trim().is_empty()) {
            return Err(SpecError::MissingCommand);
        }
        Ok(Self {
            name: res.name.clone(),
            command: res.command.clone(),
            work_dir: res.work_dir.clone(),
            cpus: res.cpus,
            memory_mb: res.memory_bytes.map(|b| b.div_ceil(1024 * 1024)),
            env: res.env.clone(),
        })
    }

    /// Shell script passed to `sbatch` on stdin.
    pub fn script(&self) -> String {
        let mut s = String::from("#!/bin/bash\n");
        let _ = writeln!(s, "#SBATCH --job-name={}", self.name);
        if let Some(cpus) = self.cpus {
            let _ = writeln!(s, "#SBATCH --cpus-per-task={cpus}");
        }
        if let Some(mb) = self.memory_mb {
            let _ = writeln!(s, "#SBATCH --mem={mb}M");
        }
        if let Some(dir) = &self.work_dir {
            let _ = writeln!(s, "#SBATCH --chdir={}", shell_quote(dir));
        }
        for var in self.env.iter() {
            let _ = writeln!(s, "export {}={}", var.name, shell_quote(&var.value));
        }
        let line: Vec<String> = self.command.iter().map(|a| shell_quote(a)).collect();
        let _ = writeln!(s, "{}", line.join(" "));
        s
    }
}

/// Quote `arg` for a POSIX shell unless it only has safe characters.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ','));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_carries_directives_env_and_quoted_command() {
        let mut res = TaskResources {
            name: "call-variants".into(),
            command: vec!["gatk".into(), "HaplotypeCaller".into(), "-I".into(), "my sample.bam".into()],
            work_dir: Some("/scratch/run1".into()),
            cpus: Some(8),
            memory_bytes: Some(4 * 1024 * 1024 * 1024),
            ..Default::default()
        };
        res.env.set("JAVA_OPTS", "-Xmx3g -Dsamjdk=true");

        let script = BatchJob::from_resources(&res).unwrap().script();
        assert_eq!(
            script,
            "#!/bin/bash\n\
             #SBATCH --job-name=call-variants\n\
             #SBATCH --cpus-per-task=8\n\
             #SBATCH --mem=4096M\n\
             #SBATCH --chdir=/scratch/run1\n\
             export JAVA_OPTS='-Xmx3g -Dsamjdk=true'\n\
             gatk HaplotypeCaller -I 'my sample.bam'\n"
        );
    }

    #[test]
    fn quotes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn requires_name_and_command() {
        let res = TaskResources {
            command: vec!["true".into()],
            ..Default::default()
        };
        assert_eq!(BatchJob::from_resources(&res), Err(SpecError::MissingName));
        let res = TaskResources {
            name: "x".into(),
            ..Default::default()
        };
        assert_eq!(BatchJob::from_resources(&res), Err(SpecError::MissingCommand));
    }
}
