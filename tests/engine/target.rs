use crate::common::code;
use crate::common::objects::{go_like_elf, RuntimeDwarf};
use crate::common::test_utils::create_temp_file;
use std::sync::Arc;
use tracefacts::config::AnalysisConfig;
use tracefacts::{CallingConvention, ConventionSource, ErrorKind, ReturnOffsetCache, Target};

#[test]
fn facts_for_register_abi_binary() {
    let elf = go_like_elf(code::MOV_RET, &[("main.handler", code::TWO_EXITS)], Some(RuntimeDwarf::default()));
    let file = create_temp_file(&elf);
    let target = Target::open(file.path(), AnalysisConfig::default()).unwrap();

    assert!(target.exe_path().is_absolute());
    assert_eq!(target.symbol_returns("main.handler").unwrap().as_slice(), &[9, 12]);

    let facts = target.facts().unwrap();
    assert_eq!(facts.thread_id_offset, 152);
    assert!(facts.register_abi);
    let json: serde_json::Value = serde_json::from_str(&facts.to_json().unwrap()).unwrap();
    assert_eq!(json["thread_id_offset"], 152);
    assert_eq!(json["register_abi"], true);
}

#[test]
fn stripped_binary_uses_helper_and_fallback() {
    let elf = go_like_elf(code::STACK_STORE_RET, &[], None);
    let file = create_temp_file(&elf);

    let target = Target::open(file.path(), AnalysisConfig::default()).unwrap();
    let decision = target.calling_convention();
    assert_eq!(decision.convention, CallingConvention::StackBased);
    assert_eq!(decision.source, ConventionSource::Helper);
    assert_eq!(target.facts().unwrap_err().kind(), ErrorKind::DebugInfoUnavailable);

    let mut config = AnalysisConfig::default();
    config.runtime.fallback_thread_id_offset = Some(152);
    let target = Target::open(file.path(), config).unwrap();
    let facts = target.facts().unwrap();
    assert_eq!(facts.thread_id_offset, 152);
    assert!(!facts.register_abi);
}

#[test]
fn missing_producer_falls_through_to_helper() {
    let dwarf = RuntimeDwarf {
        producer: None,
        ..RuntimeDwarf::default()
    };
    let file = create_temp_file(&go_like_elf(code::MOV_RET, &[], Some(dwarf)));
    let target = Target::open(file.path(), AnalysisConfig::default()).unwrap();
    let decision = target.calling_convention();
    assert_eq!(decision.convention, CallingConvention::RegisterBased);
    assert_eq!(decision.source, ConventionSource::Helper);
}

#[test]
fn shared_cache_across_targets_and_threads() {
    let elf = go_like_elf(
        code::MOV_RET,
        &[("main.a", code::TWO_EXITS), ("main.b", code::XOR_RET), ("main.stub", code::TAIL_JUMP)],
        None,
    );
    let file = create_temp_file(&elf);
    let cache = ReturnOffsetCache::new();

    let first = Target::open(file.path(), AnalysisConfig::default())
        .unwrap()
        .with_cache(cache.clone());
    let results = first.symbol_returns_many(&["main.a", "main.b", "main.stub", "main.a"]);
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].0, "main.a");
    assert_eq!(results[0].1.as_ref().unwrap().as_slice(), &[9, 12]);
    assert_eq!(results[1].1.as_ref().unwrap().as_slice(), &[2]);
    assert_eq!(results[2].1.as_ref().unwrap_err().kind(), ErrorKind::NoReturnFound);
    // Failures are not memoized.
    assert_eq!(cache.len(), 2);

    let second = Arc::new(
        Target::open(file.path(), AnalysisConfig::default())
            .unwrap()
            .with_cache(cache.clone()),
    );
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let t = Arc::clone(&second);
            std::thread::spawn(move || t.symbol_returns("main.a").unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().as_slice(), &[9, 12]);
    }
    assert_eq!(cache.len(), 2);
    assert!(cache.get(second.exe_path(), "main.b").is_some());
}

#[test]
fn open_errors() {
    let err = Target::open("/nonexistent/binary", AnalysisConfig::default()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Io);

    let file = create_temp_file(b"plain text, not an executable");
    let err = Target::open(file.path(), AnalysisConfig::default()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::MalformedObject);

    let elf = go_like_elf(code::MOV_RET, &[], None);
    let file = create_temp_file(&elf);
    let mut config = AnalysisConfig::default();
    config.io.max_file_size = 16;
    let err = Target::open(file.path(), config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Io);
}
