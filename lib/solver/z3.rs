//! Satisfiability through an external z3 process.

use log::{trace, warn};
use num_bigint::BigInt;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::process;

use crate::lattice::{Formula, Model};
use crate::solver::{SatResult, Solver};
use crate::task::{Constant, DataType, Expression, Variable};
use crate::Error;

/// Runs `z3 -in` once per query, feeding it SMT-LIB over stdin.
#[derive(Clone, Debug)]
pub struct Z3Solver {
    path: String,
}

impl Z3Solver {
    pub fn new<S: Into<String>>(path: S) -> Z3Solver {
        Z3Solver { path: path.into() }
    }

    fn run(&self, input: &str) -> Result<String, Error> {
        let mut child = process::Command::new(&self.path)
            .arg("-in")
            .stdin(process::Stdio::piped())
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .spawn()?;

        match child.stdin {
            Some(ref mut stdin) => stdin.write_all(input.as_bytes())?,
            None => return Err(Error::Custom("Failed to get stdin for z3".to_string())),
        }

        let output = child.wait_with_output()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn sort(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Integer => "Int",
        DataType::Boolean => "Bool",
        DataType::String => "String",
    }
}

fn symbol_name(variable: &Variable) -> String {
    variable.identifier().replace('|', "_")
}

fn symbol(variable: &Variable) -> String {
    format!("|{}|", symbol_name(variable))
}

fn constant_to_smtlib2(constant: &Constant) -> String {
    match constant {
        Constant::Integer(value) => {
            if value.sign() == num_bigint::Sign::Minus {
                format!("(- {})", -value)
            } else {
                value.to_string()
            }
        }
        Constant::Boolean(value) => value.to_string(),
        Constant::String(value) => format!("\"{}\"", value.replace('"', "\"\"")),
    }
}

pub fn expr_to_smtlib2(expression: &Expression) -> String {
    let binop = |op: &str, lhs: &Expression, rhs: &Expression| {
        format!("({} {} {})", op, expr_to_smtlib2(lhs), expr_to_smtlib2(rhs))
    };
    match expression {
        Expression::Variable(variable) => symbol(variable),
        Expression::Constant(constant) => constant_to_smtlib2(constant),
        Expression::Add(lhs, rhs) => binop("+", lhs, rhs),
        Expression::Sub(lhs, rhs) => binop("-", lhs, rhs),
        Expression::Mul(lhs, rhs) => binop("*", lhs, rhs),
        Expression::Div(lhs, rhs) => binop("div", lhs, rhs),
        Expression::Mod(lhs, rhs) => binop("mod", lhs, rhs),
        Expression::Cmpeq(lhs, rhs) => binop("=", lhs, rhs),
        Expression::Cmplt(lhs, rhs) => binop("<", lhs, rhs),
        Expression::Not(operand) => format!("(not {})", expr_to_smtlib2(operand)),
        Expression::And(lhs, rhs) => binop("and", lhs, rhs),
        Expression::Or(lhs, rhs) => binop("or", lhs, rhs),
    }
}

/// The SMT-LIB script checking `formula`.
pub fn formula_to_smtlib2(formula: &Formula) -> String {
    let variables: BTreeSet<&Variable> = formula.variables();

    let mut lines = vec!["(set-logic ALL)".to_string()];
    for variable in variables {
        lines.push(format!(
            "(declare-const {} {})",
            symbol(variable),
            sort(variable.data_type())
        ));
    }
    lines.push(format!(
        "(assert {})",
        expr_to_smtlib2(&formula.to_expression())
    ));
    lines.push("(check-sat)\n".to_string());
    lines.join("\n")
}

#[derive(Clone, Debug, PartialEq)]
enum SExpr {
    Atom(String),
    Str(String),
    List(Vec<SExpr>),
}

fn tokenize(text: &str) -> Option<Vec<SExpr>> {
    let mut stack: Vec<Vec<SExpr>> = vec![Vec::new()];
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' => stack.push(Vec::new()),
            ')' => {
                let list = stack.pop()?;
                stack.last_mut()?.push(SExpr::List(list));
            }
            '|' => {
                let mut name = String::new();
                loop {
                    match chars.next()? {
                        '|' => break,
                        c => name.push(c),
                    }
                }
                stack.last_mut()?.push(SExpr::Atom(name));
            }
            '"' => {
                let mut value = String::new();
                loop {
                    match chars.next()? {
                        '"' if chars.peek() == Some(&'"') => {
                            chars.next();
                            value.push('"');
                        }
                        '"' => break,
                        c => value.push(c),
                    }
                }
                stack.last_mut()?.push(SExpr::Str(value));
            }
            c if c.is_whitespace() => {}
            c => {
                let mut atom = c.to_string();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || next == '(' || next == ')' {
                        break;
                    }
                    atom.push(next);
                    chars.next();
                }
                stack.last_mut()?.push(SExpr::Atom(atom));
            }
        }
    }
    match stack.len() {
        1 => stack.pop(),
        _ => None,
    }
}

fn constant_of(value: &SExpr, data_type: DataType) -> Option<Constant> {
    match (value, data_type) {
        (SExpr::Atom(atom), DataType::Integer) => {
            atom.parse::<BigInt>().ok().map(Constant::Integer)
        }
        (SExpr::List(list), DataType::Integer) => match list.as_slice() {
            [SExpr::Atom(minus), operand] if minus == "-" => {
                match constant_of(operand, DataType::Integer)? {
                    Constant::Integer(value) => Some(Constant::Integer(-value)),
                    _ => None,
                }
            }
            _ => None,
        },
        (SExpr::Atom(atom), DataType::Boolean) => match atom.as_str() {
            "true" => Some(Constant::Boolean(true)),
            "false" => Some(Constant::Boolean(false)),
            _ => None,
        },
        (SExpr::Str(value), DataType::String) => Some(Constant::String(value.clone())),
        _ => None,
    }
}

/// Read the answer to `(get-model)`. Definitions of unknown symbols, and
/// values that are not literals, are skipped.
pub fn parse_model(output: &str, variables: &BTreeSet<&Variable>) -> Option<Model> {
    let by_name: BTreeMap<String, &Variable> = variables
        .iter()
        .map(|variable| (symbol_name(variable), *variable))
        .collect();

    let mut model = Model::new();
    let definitions = match tokenize(output)?.into_iter().last()? {
        SExpr::List(definitions) => definitions,
        _ => return None,
    };
    for definition in definitions {
        let entries = match definition {
            SExpr::List(entries) => entries,
            _ => continue,
        };
        if let [SExpr::Atom(keyword), SExpr::Atom(name), SExpr::List(arguments), _, value] =
            entries.as_slice()
        {
            if keyword != "define-fun" || !arguments.is_empty() {
                continue;
            }
            if let Some(variable) = by_name.get(name) {
                if let Some(constant) = constant_of(value, variable.data_type()) {
                    model.insert((*variable).clone(), constant);
                }
            }
        }
    }
    Some(model)
}

impl Z3Solver {
    /// Run `formula` with the trailing `commands`, returning the answer to
    /// `check-sat` and the remaining output.
    fn query(&self, formula: &Formula, commands: &str) -> (SatResult, String) {
        let input = format!("{}{}", formula_to_smtlib2(formula), commands);
        trace!("z3 input: {}", input);

        let output = match self.run(&input) {
            Ok(output) => output,
            Err(e) => {
                warn!("z3 failed, answering unknown: {}", e);
                return (SatResult::Unknown, String::new());
            }
        };

        let (first, rest) = output.split_once('\n').unwrap_or((output.as_str(), ""));
        let result = match first.trim() {
            "unsat" => SatResult::Unsat,
            "sat" => SatResult::Sat,
            line => {
                warn!("Unexpected z3 output {:?}", line);
                SatResult::Unknown
            }
        };
        (result, rest.to_string())
    }
}

impl Solver for Z3Solver {
    fn check(&self, formula: &Formula) -> Result<SatResult, Error> {
        if formula.is_false() {
            return Ok(SatResult::Unsat);
        }
        if formula.is_true() {
            return Ok(SatResult::Sat);
        }
        Ok(self.query(formula, "").0)
    }

    fn model(&self, formula: &Formula) -> Result<Option<Model>, Error> {
        if formula.is_false() {
            return Ok(None);
        }
        if formula.is_true() {
            return Ok(Some(Model::new()));
        }
        match self.query(formula, "(get-model)\n") {
            (SatResult::Sat, output) => {
                let model = parse_model(&output, &formula.variables());
                if model.is_none() {
                    warn!("Unparsable z3 model {:?}", output);
                }
                Ok(model)
            }
            _ => Ok(None),
        }
    }
}
