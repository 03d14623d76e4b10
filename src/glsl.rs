//! Interface scanner for GLSL ES shader sources.
//!
//! The software device does not execute shading-language code. It compiles a
//! stage by checking its structure and extracting the top-level interface
//! declarations, and links two stages by matching those interfaces. Diagnostics
//! use the `ERROR: 0:<line>: <message>` shape of GL info logs.

use crate::context::{GlslType, ShaderStage, UniformLocation};

/// A declared input, output or uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub ty: GlslType,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInterface {
    pub stage: ShaderStage,
    pub inputs: Vec<Declaration>,
    pub outputs: Vec<Declaration>,
    pub uniforms: Vec<Declaration>,
}

/// Interface of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedInterface {
    /// Vertex inputs with their final locations, in declaration order.
    pub attributes: Vec<(u32, Declaration)>,
    /// Active uniforms, vertex stage first, each listed once.
    pub uniforms: Vec<(UniformLocation, Declaration, ShaderStage)>,
}

impl LinkedInterface {
    pub fn attribute_at(&self, location: u32) -> Option<&Declaration> {
        self.attributes
            .iter()
            .find(|(l, _)| *l == location)
            .map(|(_, d)| d)
    }
}

const INTERPOLATION: &[&str] = &["flat", "smooth", "centroid", "invariant"];
const PRECISION: &[&str] = &["lowp", "mediump", "highp"];

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    out.push('\n');
                    break;
                }
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = ' ';
            for c in chars.by_ref() {
                if c == '\n' {
                    out.push('\n');
                }
                if prev == '*' && c == '/' {
                    break;
                }
                prev = c;
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// Remove preprocessor lines but keep their newlines.
fn strip_directives(source: &str) -> String {
    source
        .lines()
        .map(|l| if l.trim_start().starts_with('#') { "" } else { l })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_layout(statement: &str) -> &str {
    let trimmed = statement.trim_start();
    if let Some(rest) = trimmed.strip_prefix("layout") {
        if let Some(close) = rest.find(')') {
            return &rest[close + 1..];
        }
    }
    trimmed
}

fn is_main_signature(signature: &str) -> bool {
    let compact: String = signature.split_whitespace().collect::<Vec<_>>().join(" ");
    let compact = compact.replace(" (", "(").replace("( ", "(").replace(" )", ")");
    compact == "void main()" || compact == "void main(void)"
}

enum Storage {
    Input,
    Output,
    Uniform,
}

struct Scanner {
    stage: ShaderStage,
    errors: Vec<String>,
    interface: ShaderInterface,
}

impl Scanner {
    fn error(&mut self, line: usize, message: impl AsRef<str>) {
        self.errors
            .push(format!("ERROR: 0:{line}: {}", message.as_ref()));
    }

    fn statement(&mut self, text: &str, line: usize) {
        let text = strip_layout(text);
        let spaced = text.replace(',', " , ");
        let mut tokens = spaced.split_whitespace().peekable();

        while let Some(t) = tokens.peek() {
            if INTERPOLATION.contains(t) {
                tokens.next();
            } else {
                break;
            }
        }
        let Some(qualifier) = tokens.next() else {
            return;
        };

        let storage = match (qualifier, self.stage) {
            ("uniform", _) => Storage::Uniform,
            ("attribute", ShaderStage::Vertex) => Storage::Input,
            ("attribute", ShaderStage::Fragment) => {
                self.error(line, "'attribute' : supported in vertex shaders only");
                return;
            }
            ("in", _) => Storage::Input,
            ("varying", ShaderStage::Vertex) | ("out", _) => Storage::Output,
            ("varying", ShaderStage::Fragment) => Storage::Input,
            // precision statements, constants, globals
            _ => return,
        };

        let mut type_token = tokens.next();
        if type_token.is_some_and(|t| PRECISION.contains(&t)) {
            type_token = tokens.next();
        }
        let Some(type_token) = type_token else {
            self.error(line, format!("'{qualifier}' : syntax error"));
            return;
        };
        let Some(ty) = GlslType::parse(type_token) else {
            self.error(line, format!("'{type_token}' : syntax error"));
            return;
        };
        if matches!(storage, Storage::Input) && ty == GlslType::Sampler2D {
            self.error(line, format!("'{type_token}' : samplers must be uniform"));
            return;
        }

        let mut declared = false;
        for token in tokens {
            if token == "," {
                continue;
            }
            let name = token.split('[').next().unwrap_or(token).to_string();
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                self.error(line, format!("'{token}' : syntax error"));
                return;
            }
            let declaration = Declaration { name, ty, line };
            let list = match storage {
                Storage::Input => &mut self.interface.inputs,
                Storage::Output => &mut self.interface.outputs,
                Storage::Uniform => &mut self.interface.uniforms,
            };
            if list.iter().any(|d| d.name == declaration.name) {
                let name = declaration.name;
                self.error(line, format!("'{name}' : redefinition"));
                return;
            }
            list.push(declaration);
            declared = true;
        }
        if !declared {
            self.error(line, format!("'{type_token}' : syntax error"));
        }
    }
}

/// Check a stage's structure and extract its interface.
pub fn compile(stage: ShaderStage, source: &str) -> Result<ShaderInterface, String> {
    let source = strip_directives(&strip_comments(source));
    let mut scanner = Scanner {
        stage,
        errors: Vec::new(),
        interface: ShaderInterface {
            stage,
            inputs: Vec::new(),
            outputs: Vec::new(),
            uniforms: Vec::new(),
        },
    };

    let mut line = 1;
    let mut statement = String::new();
    let mut statement_line = 1;
    let mut braces = 0usize;
    let mut parens = 0usize;
    let mut has_main = false;

    for c in source.chars() {
        match c {
            '\n' => line += 1,
            '{' => {
                if braces == 0 {
                    if is_main_signature(&statement) {
                        has_main = true;
                    }
                    statement.clear();
                }
                braces += 1;
                continue;
            }
            '}' => {
                if braces == 0 {
                    scanner.error(line, "'}' : syntax error");
                } else {
                    braces -= 1;
                }
                continue;
            }
            '(' => parens += 1,
            ')' => {
                if parens == 0 {
                    scanner.error(line, "')' : syntax error");
                    continue;
                }
                parens -= 1;
            }
            ';' if braces == 0 => {
                let text = std::mem::take(&mut statement);
                scanner.statement(&text, statement_line);
                continue;
            }
            _ => {}
        }
        if braces == 0 {
            if statement.trim().is_empty() && !c.is_whitespace() {
                statement_line = line;
            }
            statement.push(c);
        }
    }

    if braces > 0 || parens > 0 {
        scanner.error(line, "'' : unexpected end of file");
    } else if !statement.trim().is_empty() {
        scanner.error(statement_line, "'' : syntax error, missing ';'");
    }
    if !has_main {
        scanner.error(1, "'' : Missing main()");
    }

    if scanner.errors.is_empty() {
        Ok(scanner.interface)
    } else {
        Err(scanner.errors.join("\n"))
    }
}

/// Match a vertex and fragment interface and assign locations.
pub fn link(
    vertex: &ShaderInterface,
    fragment: &ShaderInterface,
    attribute_bindings: &[(u32, &str)],
) -> Result<LinkedInterface, String> {
    let mut errors = Vec::new();

    if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
        return Err("ERROR: program needs one vertex and one fragment shader".to_string());
    }

    for input in &fragment.inputs {
        match vertex.outputs.iter().find(|o| o.name == input.name) {
            None => errors.push(format!(
                "ERROR: varying `{}` is read by the fragment shader but not declared in the vertex shader",
                input.name
            )),
            Some(output) if output.ty != input.ty => errors.push(format!(
                "ERROR: varying `{}` has different types in the vertex and fragment shaders",
                input.name
            )),
            Some(_) => {}
        }
    }

    let mut uniforms: Vec<(UniformLocation, Declaration, ShaderStage)> = Vec::new();
    let declared = vertex
        .uniforms
        .iter()
        .map(|u| (u, ShaderStage::Vertex))
        .chain(fragment.uniforms.iter().map(|u| (u, ShaderStage::Fragment)));
    for (uniform, stage) in declared {
        match uniforms.iter().find(|(_, d, _)| d.name == uniform.name) {
            Some((_, existing, _)) if existing.ty != uniform.ty => errors.push(format!(
                "ERROR: uniform `{}` has different types in the vertex and fragment shaders",
                uniform.name
            )),
            Some(_) => {}
            None => {
                let location = UniformLocation(uniforms.len() as u32);
                uniforms.push((location, uniform.clone(), stage));
            }
        }
    }

    for (i, (index, name)) in attribute_bindings.iter().enumerate() {
        if let Some((_, other)) = attribute_bindings[..i]
            .iter()
            .find(|(other_index, other_name)| other_index == index && other_name != name)
        {
            errors.push(format!(
                "ERROR: attributes `{other}` and `{name}` are bound to the same location {index}"
            ));
        }
    }

    let mut attributes: Vec<(u32, Declaration)> = Vec::new();
    let mut used: Vec<u32> = attribute_bindings
        .iter()
        .filter(|(_, name)| vertex.inputs.iter().any(|i| i.name == *name))
        .map(|(index, _)| *index)
        .collect();
    for input in &vertex.inputs {
        let location = match attribute_bindings.iter().find(|(_, n)| *n == input.name) {
            Some((index, _)) => *index,
            None => {
                let mut free = 0;
                while used.contains(&free) {
                    free += 1;
                }
                used.push(free);
                free
            }
        };
        attributes.push((location, input.clone()));
    }

    if errors.is_empty() {
        Ok(LinkedInterface {
            attributes,
            uniforms,
        })
    } else {
        Err(errors.join("\n"))
    }
}
