use mapweave_mappings::{join_mappings, MappingCache, NamespacePair, Store};
use mapweave_rewrite::{
    RewriteConfig, RewriteError, SourceFile, SourceRemapOrchestrator, SourceRewriteRequest,
    SourceRewriter,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const MAPPINGS: &str = "v1\tintermediary\tnamed\n\
CLASS\tnet/minecraft/class_1\tnet/minecraft/Block\n\
CLASS\tnet/minecraft/class_2\tnet/minecraft/Item\n";

/// Replaces every mapped class name, in dotted form, longest names first.
#[derive(Default)]
struct TextRewriter {
    seen: Mutex<Vec<(Vec<String>, Vec<PathBuf>)>>,
}

impl SourceRewriter for TextRewriter {
    fn name(&self) -> &str {
        "text"
    }

    fn rewrite(&self, request: &SourceRewriteRequest<'_>) -> anyhow::Result<Vec<SourceFile>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).push((
            request.files.iter().map(|f| f.path.clone()).collect(),
            request.classpath.to_vec(),
        ));

        let mut renames: Vec<(String, String)> = request
            .mappings
            .classes()
            .map(|(from, mapping)| (from.replace('/', "."), mapping.deobfuscated.replace('/', ".")))
            .collect();
        renames.sort_by_key(|(from, _)| std::cmp::Reverse(from.len()));

        Ok(request
            .files
            .iter()
            .map(|file| {
                let text = renames
                    .iter()
                    .fold(file.text.clone(), |text, (from, to)| text.replace(from.as_str(), to));
                SourceFile::new(file.path.as_str(), text)
            })
            .collect())
    }
}

/// Fails on any file mentioning `Broken`.
struct PickyRewriter;

impl SourceRewriter for PickyRewriter {
    fn name(&self) -> &str {
        "picky"
    }

    fn rewrite(&self, request: &SourceRewriteRequest<'_>) -> anyhow::Result<Vec<SourceFile>> {
        if let Some(file) = request.files.iter().find(|f| f.text.contains("Broken")) {
            anyhow::bail!("cannot parse {}", file.path);
        }
        Ok(request.files.to_vec())
    }
}

/// Returns only the first file.
struct LossyRewriter;

impl SourceRewriter for LossyRewriter {
    fn name(&self) -> &str {
        "lossy"
    }

    fn rewrite(&self, request: &SourceRewriteRequest<'_>) -> anyhow::Result<Vec<SourceFile>> {
        Ok(request.files.iter().take(1).cloned().collect())
    }
}

fn write_jar(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).expect("create jar"));
    for (name, text) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(text.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish jar");
}

fn read_jar(path: &Path) -> BTreeMap<String, String> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).expect("open")).expect("zip");
    let mut out = BTreeMap::new();
    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx).expect("entry");
        if entry.is_dir() {
            continue;
        }
        let mut text = String::new();
        entry.read_to_string(&mut text).expect("utf8 entry");
        out.insert(entry.name().to_string(), text);
    }
    out
}

fn source_jar(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("game-sources.jar");
    write_jar(
        &path,
        &[
            (
                "net/minecraft/class_1.java",
                "class class_1 { net.minecraft.class_2 item; }",
            ),
            ("net/minecraft/class_2.java", "class class_2 {}"),
            ("assets/lang/en_us.json", "{\"net.minecraft.class_1\": 1}"),
        ],
    );
    path
}

#[test]
fn remaps_java_units_and_copies_everything_else() {
    let temp = TempDir::new().expect("tempdir");
    let input = source_jar(&temp);
    let lib = temp.path().join("lib.jar");
    write_jar(&lib, &[("lib/Util.class", "")]);
    let store = Store::load(MAPPINGS).expect("mappings");
    let cache = MappingCache::new();
    let rewriter = Arc::new(TextRewriter::default());
    let orchestrator =
        SourceRemapOrchestrator::new(rewriter.clone(), &cache, RewriteConfig::default())
            .expect("orchestrator");

    let output = temp.path().join("out/game-sources-named.jar");
    let pair = NamespacePair::new("intermediary", "named");
    let outcome = orchestrator
        .remap_sources(&input, &store, &pair, &output, &[lib.clone(), lib.clone()])
        .expect("remap");
    assert_eq!(outcome.sources, 2);
    assert_eq!(outcome.resources, 1);

    let entries = read_jar(&output);
    assert_eq!(
        entries["net/minecraft/class_1.java"],
        "class class_1 { net.minecraft.Item item; }"
    );
    assert_eq!(
        entries["assets/lang/en_us.json"],
        "{\"net.minecraft.class_1\": 1}"
    );

    let seen = rewriter.seen.lock().unwrap_or_else(PoisonError::into_inner);
    assert_eq!(
        seen.as_slice(),
        &[(
            vec![
                "net/minecraft/class_1.java".to_string(),
                "net/minecraft/class_2.java".to_string()
            ],
            vec![lib]
        )]
    );
    assert_eq!(cache.len(), 1);
}

#[test]
fn directory_input_produces_directory_output() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("src");
    std::fs::create_dir_all(input.join("net/minecraft")).expect("source dir");
    std::fs::write(input.join("net/minecraft/Use.java"), "net.minecraft.class_1 b;")
        .expect("source");
    std::fs::write(input.join("notes.txt"), "net.minecraft.class_1").expect("resource");
    let store = Store::load(MAPPINGS).expect("mappings");
    let cache = MappingCache::new();
    let orchestrator = SourceRemapOrchestrator::new(
        Arc::new(TextRewriter::default()),
        &cache,
        RewriteConfig::default(),
    )
    .expect("orchestrator");

    let output = temp.path().join("remapped");
    let pair = NamespacePair::new("intermediary", "named");
    orchestrator
        .remap_sources(&input, &store, &pair, &output, &[])
        .expect("remap");
    assert_eq!(
        std::fs::read_to_string(output.join("net/minecraft/Use.java")).expect("remapped source"),
        "net.minecraft.Block b;"
    );
    assert_eq!(
        std::fs::read_to_string(output.join("notes.txt")).expect("copied resource"),
        "net.minecraft.class_1"
    );

    let err = orchestrator
        .remap_sources(&input, &store, &pair, &input, &[])
        .unwrap_err();
    assert!(matches!(err, RewriteError::OutputIsInput(_)), "{err}");
    assert!(input.join("net/minecraft/Use.java").is_file());
}

#[test]
fn joined_mappings_drive_a_migration() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("mod-sources.jar");
    write_jar(&input, &[("mod/Hook.java", "Block target; Item drop;")]);
    let current = Store::load(
        "v1\tintermediary\tnamed\nCLASS\tclass_1\tBlock\nCLASS\tclass_2\tItem\n",
    )
    .expect("current");
    let next = Store::load("v1\tintermediary\tnamed\nCLASS\tclass_1\tBlockType\n").expect("next");
    let joined = join_mappings(&current, &next, "intermediary", "named").expect("join");

    let cache = MappingCache::new();
    let orchestrator = SourceRemapOrchestrator::new(
        Arc::new(TextRewriter::default()),
        &cache,
        RewriteConfig::default(),
    )
    .expect("orchestrator");
    let output = temp.path().join("migrated.jar");
    orchestrator
        .remap_with(&input, &joined, &output, &[])
        .expect("migrate");
    assert_eq!(
        read_jar(&output)["mod/Hook.java"],
        "BlockType target; Item drop;"
    );
}

#[test]
fn same_archive_path_moves_input_to_dev_archive() {
    let temp = TempDir::new().expect("tempdir");
    let input = source_jar(&temp);
    let store = Store::load(MAPPINGS).expect("mappings");
    let cache = MappingCache::new();
    let orchestrator = SourceRemapOrchestrator::new(
        Arc::new(TextRewriter::default()),
        &cache,
        RewriteConfig::default(),
    )
    .expect("orchestrator");
    let pair = NamespacePair::new("intermediary", "named");

    orchestrator
        .remap_sources(&input, &store, &pair, &input, &[])
        .expect("remap in place");
    assert_eq!(
        read_jar(&input)["net/minecraft/class_2.java"],
        "class class_2 {}"
    );
    assert!(read_jar(&input)["net/minecraft/class_1.java"].contains("net.minecraft.Item"));
    let dev = temp.path().join("game-sources-dev.jar");
    assert!(read_jar(&dev)["net/minecraft/class_1.java"].contains("net.minecraft.class_2"));
}

#[test]
fn failure_deletes_output_and_restores_input() {
    let temp = TempDir::new().expect("tempdir");
    let input = temp.path().join("game-sources.jar");
    write_jar(&input, &[("a/Ok.java", "class Ok {}"), ("a/Bad.java", "Broken")]);
    let before = std::fs::read(&input).expect("read input");
    let store = Store::load(MAPPINGS).expect("mappings");
    let cache = MappingCache::new();
    let orchestrator =
        SourceRemapOrchestrator::new(Arc::new(PickyRewriter), &cache, RewriteConfig::default())
            .expect("orchestrator");
    let pair = NamespacePair::new("intermediary", "named");

    let output = temp.path().join("out.jar");
    std::fs::write(&output, b"stale").expect("stale output");
    let generation = cache.generation();
    let err = orchestrator
        .remap_sources(&input, &store, &pair, &output, &[])
        .unwrap_err();
    match &err {
        RewriteError::RewriteFailure {
            rewriter, message, ..
        } => {
            assert_eq!(rewriter, "picky");
            assert!(message.contains("a/Bad.java"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
    assert!(cache.generation() > generation);

    assert!(orchestrator
        .remap_sources(&input, &store, &pair, &input, &[])
        .is_err());
    assert_eq!(std::fs::read(&input).expect("input restored"), before);
    assert!(!temp.path().join("game-sources-dev.jar").exists());
}

#[test]
fn rewriter_must_return_every_unit() {
    let temp = TempDir::new().expect("tempdir");
    let input = source_jar(&temp);
    let store = Store::load(MAPPINGS).expect("mappings");
    let cache = MappingCache::new();
    let orchestrator =
        SourceRemapOrchestrator::new(Arc::new(LossyRewriter), &cache, RewriteConfig::default())
            .expect("orchestrator");
    let output = temp.path().join("out.jar");
    let pair = NamespacePair::new("intermediary", "named");

    let err = orchestrator
        .remap_sources(&input, &store, &pair, &output, &[])
        .unwrap_err();
    assert!(err.to_string().contains("no output for net/minecraft/class_2.java"), "{err}");
    assert!(!output.exists());
}
