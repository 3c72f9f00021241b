use relaxng_model::datatype::Registry;
use relaxng_model::json::{self, JsonOptions};
use relaxng_model::model::Grammar;
use relaxng_model::{Compiler, CompilerOptions, FsLoader};
use relaxng_validator::Validator;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;
use structopt::StructOpt;
use url::Url;

#[derive(Debug, StructOpt)]
#[structopt(name = "rng", about = "Relax NG schema compiler and validator")]
enum Cli {
    /// Validate XML documents against a schema (a .rng file, or a compiled .json grammar)
    Validate { schema: PathBuf, xml: Vec<PathBuf> },
    /// Print the simplified form of a schema
    Simplify { schema: PathBuf },
    /// Compile a schema, printing the grammar as JSON
    Compile {
        schema: PathBuf,
        /// Use kind names rather than numeric codes
        #[structopt(long)]
        verbose: bool,
        /// Include the schema location of each pattern
        #[structopt(long)]
        paths: bool,
        /// Keep the original define names
        #[structopt(long)]
        keep_names: bool,
    },
}

fn main() {
    match Cli::from_args() {
        Cli::Validate { schema, xml } => validate(&schema, xml),
        Cli::Simplify { schema } => simplify(&schema),
        Cli::Compile {
            schema,
            verbose,
            paths,
            keep_names,
        } => compile(
            &schema,
            JsonOptions {
                verbose,
                include_paths: paths,
                renumber: !keep_names,
            },
        ),
    }
}

fn schema_url(schema: &Path) -> Url {
    let path = match std::fs::canonicalize(schema) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}: {}", schema.display(), e);
            exit(1);
        }
    };
    match Url::from_file_path(&path) {
        Ok(url) => url,
        Err(()) => {
            eprintln!("{}: not a usable file path", path.display());
            exit(1);
        }
    }
}

fn read(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            exit(1);
        }
    }
}

fn load_grammar(schema: &Path, options: CompilerOptions) -> Arc<Grammar> {
    if schema.extension().map_or(false, |e| e == "json") {
        let registry = Registry::builtin();
        return match json::read(&read(schema), &registry) {
            Ok(g) => Arc::new(g),
            Err(e) => {
                eprintln!("{}: {}", schema.display(), e);
                exit(1);
            }
        };
    }
    let mut compiler = Compiler::new(FsLoader, options);
    match compiler.compile(&schema_url(schema)) {
        Ok(s) => s.grammar,
        Err(err) => {
            compiler.dump_diagnostic(&err);
            exit(1);
        }
    }
}

fn validate(schema: &Path, xmls: Vec<PathBuf>) {
    let grammar = load_grammar(schema, CompilerOptions::default());
    let mut failed = false;
    for xml in xmls {
        let doc = read(&xml);
        let reader = xmlparser::Tokenizer::from(&doc[..]);
        let mut v = Validator::new(&grammar, reader);
        eprintln!("Validating {:?}", xml);
        while let Some(result) = v.validate_next() {
            if let Err(err) = result {
                failed = true;
                let (map, d) = v.diagnostic(xml.to_string_lossy().to_string(), doc.clone(), &err);
                let mut emitter = codemap_diagnostic::Emitter::stderr(
                    codemap_diagnostic::ColorConfig::Auto,
                    Some(&map),
                );
                emitter.emit(&d[..]);
            }
        }
    }
    if failed {
        exit(2);
    }
}

fn simplify(schema: &Path) {
    let mut compiler = Compiler::new(FsLoader, CompilerOptions::default());
    match compiler.simplify(&schema_url(schema)) {
        Ok(tree) => println!("{}", tree.to_xml_string(tree.root())),
        Err(err) => {
            compiler.dump_diagnostic(&err);
            exit(1);
        }
    }
}

fn compile(schema: &Path, options: JsonOptions) {
    let grammar = load_grammar(
        schema,
        CompilerOptions {
            keep_paths: options.include_paths,
            ..CompilerOptions::default()
        },
    );
    println!("{}", json::write(&grammar, &options));
}
