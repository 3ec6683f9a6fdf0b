//! Command handlers shared by the one-shot subcommands and the REPL.

use clap::ValueEnum;
use colored::Colorize;
use semcat_pca::{ComponentCount, Pca};
use semcat_store::affordance::AffordanceMatrix;
use semcat_store::{BuildReport, KnowledgeStore, StoreBuilder, load_catalog};
use semcat_types::{CompositeRecord, ObjectRecord};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::info;

use crate::config::Config;

/// Value sets that `list` can enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
    Objects,
    Scenes,
    Receptacles,
    Materials,
    Actions,
    Affordances,
    Categories,
}

impl ListKind {
    pub fn fetch(self, store: &KnowledgeStore) -> Result<Vec<String>, String> {
        let result = match self {
            ListKind::Objects => store.object_keys(),
            ListKind::Scenes => store.scene_kinds(),
            ListKind::Receptacles => store.receptacle_kinds(),
            ListKind::Materials => store.material_kinds(),
            ListKind::Actions => store.action_kinds(),
            ListKind::Affordances => store.affordance_kinds(),
            ListKind::Categories => store.hierarchy_nodes(),
        };
        result.map_err(|e| e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// build
// ─────────────────────────────────────────────────────────────────────────────

pub fn build(
    cfg: &Config,
    components: Option<ComponentCount>,
    interactive: bool,
) -> Result<(), String> {
    let records = read_catalog(&cfg.catalog_path)?;
    let mut options = cfg.build_options()?;
    if let Some(c) = components {
        options.components = c;
    }

    if interactive {
        let matrix = AffordanceMatrix::from_records(&records);
        if matrix.is_degenerate() {
            println!("{}", "  No affordance flags in the catalog; nothing to compress.".yellow());
        } else {
            let pca = Pca::fit(&matrix.values).map_err(|e| e.to_string())?;
            let curve = pca
                .error_curve(&matrix.values, options.curve_max_k)
                .map_err(|e| e.to_string())?;
            print_error_curve(&curve);
            options.components = prompt_components(options.components);
        }
    }

    let corpus = File::open(&cfg.corpus_path).map_err(|e| {
        format!("Failed to open corpus at {}: {}", cfg.corpus_path.display(), e)
    })?;
    let store = KnowledgeStore::open(&cfg.db_path).map_err(|e| e.to_string())?;
    let report = StoreBuilder::new(options)
        .build(&store, &records, BufReader::new(corpus))
        .map_err(|e| e.to_string())?;
    store.close().map_err(|e| e.to_string())?;
    info!(db = %cfg.db_path.display(), build_id = %report.build_id, "catalog written");

    if !interactive {
        print_error_curve(&report.error_curve);
    }
    print_report(&report, &cfg.db_path);
    Ok(())
}

fn read_catalog(path: &Path) -> Result<Vec<ObjectRecord>, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open catalog at {}: {}", path.display(), e))?;
    load_catalog(BufReader::new(file)).map_err(|e| e.to_string())
}

fn print_error_curve(curve: &[f64]) {
    if curve.is_empty() {
        return;
    }
    println!();
    println!("{}", "Reconstruction error".bold().underline());
    let worst = curve[0].max(f64::MIN_POSITIVE);
    for (k, err) in curve.iter().enumerate() {
        let bar = "█".repeat(((err / worst) * 40.0).round() as usize);
        println!("  k={:>3}  {:>10.4}  {}", k, err, bar.cyan());
    }
    println!();
}

fn print_report(report: &BuildReport, db_path: &Path) {
    println!("{} Catalog built into {}", "✓".green().bold(), db_path.display().to_string().bold());
    println!("  Objects          : {}", report.objects);
    println!(
        "  Embeddings       : {} ({} missing, {} corpus lines)",
        report.embeddings,
        report.missing_embeddings.len(),
        report.corpus_lines
    );
    println!("  Category nodes   : {}", report.hierarchy.nodes);
    println!(
        "  Tags             : {} scenes, {} receptacles, {} materials, {} actions",
        report.scenes, report.receptacles, report.materials, report.actions
    );
    match report.n_components {
        Some(k) => println!(
            "  Affordances      : {} flags -> {} components",
            report.affordance_flags, k
        ),
        None => println!("  Affordances      : {}", "not compressed".yellow()),
    }
    if !report.missing_embeddings.is_empty() {
        println!(
            "  {} {}",
            "No embedding for:".dimmed(),
            report.missing_embeddings.join(", ").dimmed()
        );
    }
}

fn prompt_components(default: ComponentCount) -> ComponentCount {
    let stdin = std::io::stdin();
    loop {
        print!("  Number of dimensions to use in PCA [{}]: ", default);
        std::io::stdout().flush().ok();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return default,
            Ok(_) => {}
        }
        let t = line.trim();
        if t.is_empty() {
            return default;
        }
        match t.parse() {
            Ok(c) => return c,
            Err(e) => println!("  {}", e.red()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// load / list
// ─────────────────────────────────────────────────────────────────────────────

pub fn open_store(cfg: &Config) -> Result<KnowledgeStore, String> {
    if !cfg.db_path.exists() {
        return Err(format!(
            "No catalog at {}; run `semcat build` first",
            cfg.db_path.display()
        ));
    }
    KnowledgeStore::open_read_only(&cfg.db_path).map_err(|e| e.to_string())
}

pub fn load(store: &KnowledgeStore, key: &str, json: bool) -> Result<(), String> {
    let record = store.load(key).map_err(|e| e.to_string())?;
    if json {
        let out = serde_json::to_string_pretty(&record)
            .map_err(|e| format!("Failed to serialize record: {}", e))?;
        println!("{out}");
    } else {
        print_record(&record);
    }
    Ok(())
}

pub fn list(store: &KnowledgeStore, kind: ListKind) -> Result<(), String> {
    let values = kind.fetch(store)?;
    for v in &values {
        println!("  {v}");
    }
    println!("{}", format!("  ({} values)", values.len()).dimmed());
    Ok(())
}

fn print_record(r: &CompositeRecord) {
    println!();
    println!("{}", r.key.bold().underline());
    println!("  Embedding key : {}", r.embedding_key);
    match &r.embedding {
        Some(v) => {
            let head: Vec<String> = v.iter().take(4).map(|x| format!("{x:.4}")).collect();
            println!("  Embedding     : [{}, …] ({} dims)", head.join(", "), v.len());
        }
        None => println!("  Embedding     : {}", "none".dimmed()),
    }
    if let Some(tag) = &r.lexical_tag {
        println!("  Lexical tag   : {tag}");
    }
    if let Some(ctx) = &r.interaction_context {
        println!("  Context       : {ctx}");
    }
    println!("  Scenes        : {}", r.scenes.join(", "));
    println!("  Receptacles   : {}", r.receptacles.join(", "));
    println!("  Materials     : {}", r.materials.join(", "));
    let actions: Vec<String> = r.actions.iter().map(|a| a.to_string()).collect();
    println!("  Actions       : {}", actions.join(", "));
    for path in &r.category_paths {
        println!("  Category      : {}", path.join(" > ").cyan());
    }
    let held: Vec<&str> = r
        .affordances
        .iter()
        .filter(|(_, v)| **v)
        .map(|(k, _)| k.as_str())
        .collect();
    println!("  Affordances   : {}", held.join(", ").green());
    match &r.reduced_affordances {
        Some(v) => {
            let vals: Vec<String> = v.iter().map(|x| format!("{x:.3}")).collect();
            println!("  Reduced       : [{}]", vals.join(", "));
        }
        None => println!("  Reduced       : {}", "none".dimmed()),
    }
    println!();
}
