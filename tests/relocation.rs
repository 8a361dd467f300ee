// tests/relocation.rs

//! End-to-end relocation of fake installations.
//!
//! Each test builds a small posix installation in a temporary directory,
//! with launcher scripts and module caches generated through the marshal
//! codec, and runs the full driver against it.

#![cfg(unix)]

mod common;

use common::{
    cache_origins, distinct_filename_objects, module_cache, FakeInstall, Sharing, HEADER_311,
};
use prefix_relocate::{relocate, Error, MalformedPolicy, Platform, RelocateOptions};
use relocate_marshal::Container;
use std::fs;
use std::os::unix::fs::PermissionsExt;

const OLD_MODULE: &str = "/old/root/lib/python3.11/pkg/mod.py";
const NEW_MODULE: &str = "/new root/lib/python3.11/pkg/mod.py";

fn options() -> RelocateOptions {
    RelocateOptions::new()
        .with_platform(Platform::Posix)
        .with_prefix("/new root")
}

#[test]
fn test_relocate_scripts_and_caches() {
    let install = FakeInstall::posix();
    let pip = install.script(
        "pip",
        "#!/old/root/bin/python3.11\n# -*- coding: utf-8 -*-\nimport sys\n",
    );
    let tool = install.script("tool", "#!\"/old/root/bin/python\" -O\nprint('hi')\n");
    let cache = install.cache("pkg/mod.pyc", &module_cache(OLD_MODULE, Sharing::SharedFilename));

    let report = relocate(&install.base, &options().with_extra_args(["-X"])).unwrap();

    assert_eq!(report.scripts, vec![pip.clone(), tool.clone()]);
    assert_eq!(report.caches, vec![cache.clone()]);
    assert_eq!(report.touched(), 3);

    assert_eq!(
        fs::read_to_string(&pip).unwrap(),
        "#!\"/new root/bin/python3.11\" -X\n# -*- coding: utf-8 -*-\nimport sys\n"
    );
    assert_eq!(
        fs::read_to_string(&tool).unwrap(),
        "#!\"/new root/bin/python\" -O -X\nprint('hi')\n"
    );
    assert_eq!(
        fs::metadata(&tool).unwrap().permissions().mode() & 0o777,
        0o755
    );
    assert_eq!(cache_origins(&fs::read(&cache).unwrap()), vec![NEW_MODULE; 3]);
}

#[test]
fn test_clear_args() {
    let install = FakeInstall::posix();
    let tool = install.script("tool", "#!\"/old/root/bin/python\" -O\n");

    relocate(&install.base, &options().with_clear_args(true)).unwrap();
    assert_eq!(fs::read_to_string(&tool).unwrap(), "#!\"/new root/bin/python\"\n");
}

#[test]
fn test_second_run_touches_nothing() {
    let install = FakeInstall::posix();
    install.script("pip", "#!/old/root/bin/python3 -E\nimport pip\n");
    install.script("env-tool", "#!/usr/bin/env python\nimport os\n");
    install.cache("pkg/mod.pyc", &module_cache(OLD_MODULE, Sharing::SharedFilename));
    install.cache(
        "pkg/__pycache__/mod.cpython-311.pyc",
        &module_cache(OLD_MODULE, Sharing::SeparateFilenames),
    );

    let options = options().with_extra_args(["-s"]);
    let first = relocate(&install.base, &options).unwrap();
    assert_eq!(first.touched(), 3);
    let after_first = install.snapshot();

    let second = relocate(&install.base, &options).unwrap();
    assert_eq!(second.touched(), 0);
    assert_eq!(install.snapshot(), after_first);
}

#[test]
fn test_pycache_directory_excluded_by_default() {
    let install = FakeInstall::posix();
    let cached = install.cache(
        "pkg/__pycache__/mod.cpython-311.pyc",
        &module_cache(OLD_MODULE, Sharing::SharedFilename),
    );

    let report = relocate(&install.base, &options()).unwrap();
    assert!(report.caches.is_empty());
    assert_eq!(cache_origins(&fs::read(&cached).unwrap())[0], OLD_MODULE);

    let report = relocate(&install.base, &options().with_exclude_dirs(["_vendor"])).unwrap();
    assert_eq!(report.caches, vec![cached.clone()]);
    assert_eq!(cache_origins(&fs::read(&cached).unwrap())[0], NEW_MODULE);
}

#[test]
fn test_header_preserved() {
    let install = FakeInstall::posix();
    let cache = install.cache("pkg/mod.pyc", &module_cache(OLD_MODULE, Sharing::SharedFilename));

    relocate(&install.base, &options()).unwrap();
    let bytes = fs::read(&cache).unwrap();
    assert_eq!(&bytes[..16], &HEADER_311);
}

#[test]
fn test_nested_aliasing_preserved() {
    let install = FakeInstall::posix();
    let shared = install.cache("pkg/mod.pyc", &module_cache(OLD_MODULE, Sharing::SharedFilename));
    let separate = install.cache(
        "pkg/copies.pyc",
        &module_cache(OLD_MODULE, Sharing::SeparateFilenames),
    );
    let unit = install.cache("pkg/unit.pyc", &module_cache(OLD_MODULE, Sharing::SharedUnit));

    relocate(&install.base, &options()).unwrap();

    let shared = fs::read(&shared).unwrap();
    assert_eq!(cache_origins(&shared), vec![NEW_MODULE; 3]);
    assert_eq!(distinct_filename_objects(&shared), 1);

    let separate = fs::read(&separate).unwrap();
    assert_eq!(
        cache_origins(&separate),
        vec!["/new root/lib/python3.11/pkg/copies.py"; 3]
    );
    assert_eq!(distinct_filename_objects(&separate), 3);

    let unit = fs::read(&unit).unwrap();
    let container = Container::parse(&unit).unwrap();
    let graph = container.graph();
    let root = graph.root().unwrap();
    let nested = graph.nested_units(root);
    assert_eq!(nested.len(), 2);
    assert_eq!(nested[0], nested[1]);
    assert_eq!(
        graph.filename(nested[0]).unwrap(),
        "/new root/lib/python3.11/pkg/unit.py"
    );
}

#[test]
fn test_unchanged_container_round_trips_exactly() {
    for sharing in [Sharing::SharedFilename, Sharing::SeparateFilenames, Sharing::SharedUnit] {
        let bytes = module_cache(OLD_MODULE, sharing);
        let container = Container::parse(&bytes).unwrap();
        assert_eq!(container.to_bytes().unwrap(), bytes);
    }
}

#[test]
fn test_relocate_in_place_writes_nothing() {
    let install = FakeInstall::posix();
    let base = install.base.display().to_string();
    install.script("pip", &format!("#!{}/bin/python\nimport pip\n", base));
    install.script("trailing", &format!("#!{}/bin/python \nimport pip\n", base));
    install.script("spaced", &format!("#!{}/bin/python  -E\nimport pip\n", base));
    install.cache(
        "pkg/mod.pyc",
        &module_cache(&format!("{}/lib/python3.11/pkg/mod.py", base), Sharing::SharedFilename),
    );
    let before = install.snapshot();

    let options = RelocateOptions::new().with_platform(Platform::Posix);
    let report = relocate(&install.base, &options).unwrap();

    assert_eq!(report.touched(), 0);
    assert_eq!(install.snapshot(), before);
}

#[test]
fn test_missing_interpreter_is_fatal() {
    let install = FakeInstall::posix();
    install.script("pip", "#!/old/root/bin/python\n");
    install.cache("pkg/mod.pyc", &module_cache(OLD_MODULE, Sharing::SharedFilename));
    fs::remove_file(install.base.join("bin/python")).unwrap();
    let before = install.snapshot();

    let err = relocate(&install.base, &options()).unwrap_err();
    assert!(matches!(err, Error::InvalidInstallation { .. }));
    assert!(err.is_fatal());
    assert_eq!(install.snapshot(), before);
}

#[test]
fn test_foreign_scripts_untouched() {
    let install = FakeInstall::posix();
    let perl = install.script("cpan", "#!/usr/bin/perl\nuse strict;\n");
    let shell = install.script("activate", "# source me\nexport PATH\n");

    let report = relocate(&install.base, &options()).unwrap();
    assert!(report.scripts.is_empty());
    assert_eq!(fs::read_to_string(perl).unwrap(), "#!/usr/bin/perl\nuse strict;\n");
    assert_eq!(fs::read_to_string(shell).unwrap(), "# source me\nexport PATH\n");
}

#[test]
fn test_malformed_policy() {
    let install = FakeInstall::posix();
    let good = install.cache("pkg/good.pyc", &module_cache(OLD_MODULE, Sharing::SharedFilename));
    let mut corrupt = module_cache(OLD_MODULE, Sharing::SharedFilename);
    corrupt.truncate(corrupt.len() / 2);
    let bad = install.cache("pkg/bad.pyc", &corrupt);

    let err = relocate(
        &install.base,
        &options().with_on_malformed(MalformedPolicy::Error),
    )
    .unwrap_err();
    assert!(matches!(err, Error::MalformedContainer { ref path, .. } if *path == bad));

    let report = relocate(
        &install.base,
        &options().with_on_malformed(MalformedPolicy::Ignore),
    )
    .unwrap();
    assert_eq!(report.malformed.len(), 1);

    let report = relocate(&install.base, &options()).unwrap();
    assert_eq!(report.malformed.len(), 1);
    assert_eq!(report.malformed[0].path, bad);
    assert_eq!(fs::read(&bad).unwrap(), corrupt);
    assert_eq!(
        cache_origins(&fs::read(&good).unwrap())[0],
        "/new root/lib/python3.11/pkg/good.py"
    );
}

#[test]
fn test_local_symlinks_repaired() {
    let install = FakeInstall::posix();
    fs::create_dir_all(install.base.join("local")).unwrap();
    std::os::unix::fs::symlink("/old/root/bin", install.base.join("local/bin")).unwrap();

    let report = relocate(&install.base, &options()).unwrap();
    assert_eq!(report.symlinks, vec![install.base.join("local/bin")]);
    assert_eq!(
        fs::read_link(install.base.join("local/bin")).unwrap(),
        std::path::PathBuf::from("../bin")
    );
}

#[test]
fn test_unrepairable_symlink_keeps_earlier_stages() {
    let install = FakeInstall::posix();
    let pip = install.script("pip", "#!/old/root/bin/python\n");
    install.cache("pkg/mod.pyc", &module_cache(OLD_MODULE, Sharing::SharedFilename));
    let local = install.base.join("local");
    fs::create_dir_all(&local).unwrap();
    std::os::unix::fs::symlink("/old/root/bin", local.join("bin")).unwrap();
    fs::set_permissions(&local, fs::Permissions::from_mode(0o555)).unwrap();

    let result = relocate(&install.base, &options());
    fs::set_permissions(&local, fs::Permissions::from_mode(0o755)).unwrap();

    let report = result.unwrap();
    assert_eq!(report.scripts, vec![pip.clone()]);
    assert_eq!(report.caches.len(), 1);
    assert_eq!(fs::read_to_string(pip).unwrap(), "#!\"/new root/bin/python\"\n");
    // Privileged runs can still replace the link; otherwise it is skipped
    assert_eq!(report.symlinks.len() + report.skipped.len(), 1);
    if let Some(skipped) = report.skipped.first() {
        assert_eq!(skipped.path, local.join("bin"));
    }
}

#[test]
fn test_stages_can_be_skipped() {
    let install = FakeInstall::posix();
    let pip = install.script("pip", "#!/old/root/bin/python\n");
    install.cache("pkg/mod.pyc", &module_cache(OLD_MODULE, Sharing::SharedFilename));

    let report = relocate(&install.base, &options().with_stages(false, true, true)).unwrap();
    assert!(report.scripts.is_empty());
    assert_eq!(report.caches.len(), 1);
    assert_eq!(fs::read_to_string(pip).unwrap(), "#!/old/root/bin/python\n");
}
