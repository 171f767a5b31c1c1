use crate::common::test_utils::create_temp_file;
use tracefacts::config::{AnalysisConfig, IoConfig};

#[test]
fn config_defaults() {
    let config = AnalysisConfig::default();
    assert_eq!(config.io.max_file_size, 1024 * 1024 * 1024);
    assert_eq!(config.runtime.scheduler_struct, "runtime.g");
    assert_eq!(config.abi.register_abi_suffix, "; regabi");
}

#[test]
fn config_from_file() {
    let file = create_temp_file(
        br#"{
            "io": { "max_file_size": 4096 },
            "abi": { "helper_symbol": "runtime.memequal8" }
        }"#,
    );
    let config = AnalysisConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.io, IoConfig { max_file_size: 4096 });
    assert_eq!(config.abi.helper_symbol, "runtime.memequal8");
    assert_eq!(config.abi.register_abi_suffix, "; regabi");
}

#[test]
fn config_file_errors() {
    let file = create_temp_file(b"not json");
    assert!(AnalysisConfig::from_json_file(file.path()).is_err());
    assert!(AnalysisConfig::from_json_file("/nonexistent/tracefacts.json").is_err());
}
