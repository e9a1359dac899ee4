//! System information tool.

use super::Tool;
use serde_json::json;
use std::sync::Arc;

/// Read-only snapshot of the host environment.
pub fn get_system_info() -> Tool {
    Tool::new(
        "get_system_info",
        "Get information about the current operating system and environment.",
        json!({"type": "object", "properties": {}}),
        Arc::new(|_args| {
            Box::pin(async {
                let hostname = std::env::var("HOSTNAME")
                    .or_else(|_| std::env::var("COMPUTERNAME"))
                    .unwrap_or_else(|_| "unknown".to_string());
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);

                let info = json!({
                    "platform": std::env::consts::OS,
                    "arch": std::env::consts::ARCH,
                    "family": std::env::consts::FAMILY,
                    "hostname": hostname,
                    "home_directory": dirs::home_dir()
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    "temp_directory": std::env::temp_dir().to_string_lossy(),
                    "cpu": {"logical_cores": cpus},
                });

                Ok(serde_json::to_string_pretty(&info)?)
            })
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_platform_and_cpu() {
        let output = get_system_info().execute(json!({})).await.unwrap();
        let info: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(info["platform"], std::env::consts::OS);
        assert!(info["cpu"]["logical_cores"].as_u64().unwrap() >= 1);
        assert!(info["temp_directory"].as_str().is_some());
    }
}
