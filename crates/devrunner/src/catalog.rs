//! Known runners, in resolution order
//!
//! The table order is the priority order: ecosystems first (Node before
//! Python before Rust ...), then modern tools before legacy ones inside an
//! ecosystem. Nothing here touches the filesystem.

use std::fmt;

/// A language/toolchain family grouping competing tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ecosystem {
    Node,
    Python,
    Rust,
    Php,
    Go,
    Ruby,
    Java,
    DotNet,
    Elixir,
    Swift,
    Zig,
    Make,
}

impl Ecosystem {
    /// Short lowercase name, accepted by `--ignore`
    pub fn name(&self) -> &'static str {
        match self {
            Ecosystem::Node => "node",
            Ecosystem::Python => "python",
            Ecosystem::Rust => "rust",
            Ecosystem::Php => "php",
            Ecosystem::Go => "go",
            Ecosystem::Ruby => "ruby",
            Ecosystem::Java => "java",
            Ecosystem::DotNet => "dotnet",
            Ecosystem::Elixir => "elixir",
            Ecosystem::Swift => "swift",
            Ecosystem::Zig => "zig",
            Ecosystem::Make => "make",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Ecosystem::Node => "Node.js",
            Ecosystem::Python => "Python",
            Ecosystem::Rust => "Rust",
            Ecosystem::Php => "PHP",
            Ecosystem::Go => "Go",
            Ecosystem::Ruby => "Ruby",
            Ecosystem::Java => "Java",
            Ecosystem::DotNet => ".NET",
            Ecosystem::Elixir => "Elixir",
            Ecosystem::Swift => "Swift",
            Ecosystem::Zig => "Zig",
            Ecosystem::Make => "Make",
        }
    }

    /// Create from name string
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "node" | "nodejs" | "javascript" | "js" => Some(Ecosystem::Node),
            "python" | "py" => Some(Ecosystem::Python),
            "rust" => Some(Ecosystem::Rust),
            "php" => Some(Ecosystem::Php),
            "go" | "golang" => Some(Ecosystem::Go),
            "ruby" => Some(Ecosystem::Ruby),
            "java" | "jvm" => Some(Ecosystem::Java),
            "dotnet" | ".net" | "csharp" => Some(Ecosystem::DotNet),
            "elixir" => Some(Ecosystem::Elixir),
            "swift" => Some(Ecosystem::Swift),
            "zig" => Some(Ecosystem::Zig),
            "make" => Some(Ecosystem::Make),
            _ => None,
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Evidence for a runner: any one of `names` present in the directory.
///
/// Names starting with `*` match by suffix (`*.csproj`).
#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub names: &'static [&'static str],
    pub required: bool,
    pub lockfile: bool,
}

impl Marker {
    /// Manifest that must exist
    const fn manifest(names: &'static [&'static str]) -> Self {
        Self {
            names,
            required: true,
            lockfile: false,
        }
    }

    /// Lockfile that must exist
    const fn lockfile(names: &'static [&'static str]) -> Self {
        Self {
            names,
            required: true,
            lockfile: true,
        }
    }

    /// Lockfile that refines the match when present
    const fn optional_lockfile(names: &'static [&'static str]) -> Self {
        Self {
            names,
            required: false,
            lockfile: true,
        }
    }

    /// First listed file name satisfying this marker
    pub fn find<'a, I>(&self, files: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        self.names.iter().find_map(|pattern| {
            files
                .clone()
                .into_iter()
                .find(|file| pattern_matches(pattern, file))
        })
    }
}

fn pattern_matches(pattern: &str, file: &str) -> bool {
    match pattern.strip_prefix('*') {
        Some(suffix) => file.len() > suffix.len() && file.ends_with(suffix),
        None => pattern == file,
    }
}

/// How to turn a user command into a native command line
#[derive(Debug, Clone, Copy)]
pub struct Template {
    /// Executable looked up on PATH
    pub program: &'static str,
    /// Project-local wrapper preferred over `program` when present
    pub wrapper: Option<&'static str>,
    /// Arguments placed before the user command
    pub prefix: &'static [&'static str],
    /// Insert `--` between the user command and its arguments
    pub separator: bool,
}

impl Template {
    const fn direct(program: &'static str) -> Self {
        Self {
            program,
            wrapper: None,
            prefix: &[],
            separator: false,
        }
    }

    const fn with_prefix(program: &'static str, prefix: &'static [&'static str]) -> Self {
        Self {
            program,
            wrapper: None,
            prefix,
            separator: false,
        }
    }

    const fn separated(mut self) -> Self {
        self.separator = true;
        self
    }

    const fn wrapped(mut self, wrapper: &'static str) -> Self {
        self.wrapper = Some(wrapper);
        self
    }
}

/// Static description of one detectable tool
#[derive(Debug)]
pub struct RunnerDefinition {
    pub name: &'static str,
    pub ecosystem: Ecosystem,
    pub markers: &'static [Marker],
    pub template: Template,
    /// Lower wins; equals the position in the catalog
    pub priority: u8,
}

impl RunnerDefinition {
    /// Executable whose presence decides whether this runner is usable
    pub fn executable(&self) -> &'static str {
        self.template.program
    }
}

const PACKAGE_JSON: Marker = Marker::manifest(&["package.json"]);
const PYPROJECT: Marker = Marker::manifest(&["pyproject.toml"]);

static CATALOG: &[RunnerDefinition] = &[
    // Node.js
    RunnerDefinition {
        name: "bun",
        ecosystem: Ecosystem::Node,
        markers: &[PACKAGE_JSON, Marker::lockfile(&["bun.lockb", "bun.lock"])],
        template: Template::with_prefix("bun", &["run"]),
        priority: 0,
    },
    RunnerDefinition {
        name: "pnpm",
        ecosystem: Ecosystem::Node,
        markers: &[PACKAGE_JSON, Marker::lockfile(&["pnpm-lock.yaml"])],
        template: Template::with_prefix("pnpm", &["run"]),
        priority: 1,
    },
    RunnerDefinition {
        name: "yarn",
        ecosystem: Ecosystem::Node,
        markers: &[PACKAGE_JSON, Marker::lockfile(&["yarn.lock"])],
        template: Template::with_prefix("yarn", &["run"]),
        priority: 2,
    },
    RunnerDefinition {
        name: "npm",
        ecosystem: Ecosystem::Node,
        markers: &[PACKAGE_JSON, Marker::optional_lockfile(&["package-lock.json"])],
        template: Template::with_prefix("npm", &["run"]).separated(),
        priority: 3,
    },
    // Python
    RunnerDefinition {
        name: "uv",
        ecosystem: Ecosystem::Python,
        markers: &[PYPROJECT, Marker::lockfile(&["uv.lock"])],
        template: Template::with_prefix("uv", &["run"]),
        priority: 4,
    },
    RunnerDefinition {
        name: "poetry",
        ecosystem: Ecosystem::Python,
        markers: &[PYPROJECT, Marker::lockfile(&["poetry.lock"])],
        template: Template::with_prefix("poetry", &["run"]),
        priority: 5,
    },
    RunnerDefinition {
        name: "pdm",
        ecosystem: Ecosystem::Python,
        markers: &[PYPROJECT, Marker::lockfile(&["pdm.lock"])],
        template: Template::with_prefix("pdm", &["run"]),
        priority: 6,
    },
    RunnerDefinition {
        name: "pipenv",
        ecosystem: Ecosystem::Python,
        markers: &[
            Marker::manifest(&["Pipfile"]),
            Marker::optional_lockfile(&["Pipfile.lock"]),
        ],
        template: Template::with_prefix("pipenv", &["run"]),
        priority: 7,
    },
    RunnerDefinition {
        name: "pip",
        ecosystem: Ecosystem::Python,
        markers: &[Marker::manifest(&["requirements.txt", "setup.py", "pyproject.toml"])],
        template: Template::with_prefix("python", &["-m"]),
        priority: 8,
    },
    // Rust
    RunnerDefinition {
        name: "cargo",
        ecosystem: Ecosystem::Rust,
        markers: &[
            Marker::manifest(&["Cargo.toml"]),
            Marker::optional_lockfile(&["Cargo.lock"]),
        ],
        template: Template::direct("cargo"),
        priority: 9,
    },
    // PHP
    RunnerDefinition {
        name: "composer",
        ecosystem: Ecosystem::Php,
        markers: &[
            Marker::manifest(&["composer.json"]),
            Marker::optional_lockfile(&["composer.lock"]),
        ],
        template: Template::with_prefix("composer", &["run-script"]).separated(),
        priority: 10,
    },
    // Go
    RunnerDefinition {
        name: "go",
        ecosystem: Ecosystem::Go,
        markers: &[
            Marker::manifest(&["go.mod"]),
            Marker::optional_lockfile(&["go.sum"]),
        ],
        template: Template::direct("go"),
        priority: 11,
    },
    // Ruby
    RunnerDefinition {
        name: "bundler",
        ecosystem: Ecosystem::Ruby,
        markers: &[
            Marker::manifest(&["Gemfile"]),
            Marker::optional_lockfile(&["Gemfile.lock"]),
        ],
        template: Template::with_prefix("bundle", &["exec"]),
        priority: 12,
    },
    // Java
    RunnerDefinition {
        name: "gradle",
        ecosystem: Ecosystem::Java,
        markers: &[
            Marker::manifest(&["build.gradle", "build.gradle.kts"]),
            Marker::optional_lockfile(&["gradle.lockfile"]),
        ],
        template: Template::direct("gradle").wrapped("gradlew"),
        priority: 13,
    },
    RunnerDefinition {
        name: "maven",
        ecosystem: Ecosystem::Java,
        markers: &[Marker::manifest(&["pom.xml"])],
        template: Template::direct("mvn").wrapped("mvnw"),
        priority: 14,
    },
    // .NET
    RunnerDefinition {
        name: "dotnet",
        ecosystem: Ecosystem::DotNet,
        markers: &[
            Marker::manifest(&["*.csproj", "*.fsproj", "*.sln"]),
            Marker::optional_lockfile(&["packages.lock.json"]),
        ],
        template: Template::direct("dotnet"),
        priority: 15,
    },
    // Elixir
    RunnerDefinition {
        name: "mix",
        ecosystem: Ecosystem::Elixir,
        markers: &[
            Marker::manifest(&["mix.exs"]),
            Marker::optional_lockfile(&["mix.lock"]),
        ],
        template: Template::direct("mix"),
        priority: 16,
    },
    // Swift
    RunnerDefinition {
        name: "swift",
        ecosystem: Ecosystem::Swift,
        markers: &[
            Marker::manifest(&["Package.swift"]),
            Marker::optional_lockfile(&["Package.resolved"]),
        ],
        template: Template::direct("swift"),
        priority: 17,
    },
    // Zig
    RunnerDefinition {
        name: "zig",
        ecosystem: Ecosystem::Zig,
        markers: &[
            Marker::manifest(&["build.zig"]),
            Marker::optional_lockfile(&["build.zig.zon"]),
        ],
        template: Template::with_prefix("zig", &["build"]),
        priority: 18,
    },
    // Make is last, as it's the most generic
    RunnerDefinition {
        name: "make",
        ecosystem: Ecosystem::Make,
        markers: &[Marker::manifest(&["Makefile", "makefile", "GNUmakefile"])],
        template: Template::direct("make"),
        priority: 19,
    },
];

/// All runner definitions in resolution order
pub fn catalog() -> &'static [RunnerDefinition] {
    CATALOG
}

/// Look a runner up by tool name
pub fn find(name: &str) -> Option<&'static RunnerDefinition> {
    CATALOG.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}
