use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::sexpr::SExpr;

/// What the solver says about one satisfiability query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

impl fmt::Display for SatResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SatResult::Sat => write!(f, "sat"),
            SatResult::Unsat => write!(f, "unsat"),
            SatResult::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug)]
pub enum SolverError {
    /// The solver process could not be launched.
    Spawn(String, String),

    /// The pipe to the solver broke. This is what a killed worker looks like
    /// from the inside.
    Io(String),

    /// The solver reported an error term.
    Solver(String),

    /// The solver answered a check with something other than sat/unsat/unknown.
    UnexpectedResponse(String),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SolverError::Spawn(program, e) => {
                write!(f, "could not launch solver '{}': {}", program, e)
            }
            SolverError::Io(e) => write!(f, "solver i/o error: {}", e),
            SolverError::Solver(e) => write!(f, "solver error: {}", e),
            SolverError::UnexpectedResponse(line) => {
                write!(f, "unexpected solver response: {}", line)
            }
        }
    }
}

impl From<std::io::Error> for SolverError {
    fn from(e: std::io::Error) -> SolverError {
        SolverError::Io(e.to_string())
    }
}

/// The five primitives the judgment procedure needs from a solver backend.
/// Anything that can declare symbols, assert formulas, and answer
/// satisfiability queries (optionally under a temporary assumption) works.
pub trait SmtSolver {
    /// Sends a raw declaration command, like (declare-sort Person 0).
    fn declare(&mut self, decl: &SExpr) -> Result<(), SolverError>;

    /// Asserts a formula permanently.
    fn assert(&mut self, term: &SExpr) -> Result<(), SolverError>;

    /// Checks satisfiability of everything asserted so far.
    fn check(&mut self) -> Result<SatResult, SolverError>;

    /// Checks satisfiability with one extra formula assumed temporarily.
    fn check_assuming(&mut self, term: &SExpr) -> Result<SatResult, SolverError>;
}

/// How to launch the external solver process.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    pub program: String,
    pub args: Vec<String>,

    /// A soft per-query limit passed on the solver command line, if set.
    /// Queries past the limit answer unknown rather than hanging; the hard
    /// wall-clock budget lives in the execution engine, not here.
    pub soft_timeout: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig::z3()
    }
}

impl SolverConfig {
    pub fn z3() -> SolverConfig {
        SolverConfig {
            program: "z3".to_string(),
            args: vec!["-in".to_string(), "-smt2".to_string()],
            soft_timeout: None,
        }
    }

    pub fn cvc5() -> SolverConfig {
        SolverConfig {
            program: "cvc5".to_string(),
            args: vec!["--incremental".to_string()],
            soft_timeout: None,
        }
    }

    /// Builds a config for the given program name, recognizing the solvers we
    /// know the flags for.
    pub fn for_program(program: &str) -> SolverConfig {
        if program.contains("cvc5") {
            SolverConfig {
                program: program.to_string(),
                ..SolverConfig::cvc5()
            }
        } else {
            SolverConfig {
                program: program.to_string(),
                ..SolverConfig::z3()
            }
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        // The soft limit is best-effort: it only becomes a flag for solvers
        // whose command line we know. Anything else still gets the hard
        // wall-clock kill from the execution engine.
        if let Some(limit) = self.soft_timeout {
            let ms = limit.as_millis();
            if self.program.contains("cvc5") {
                command.arg(format!("--tlimit-per={}", ms));
            } else if self.program.contains("z3") {
                command.arg(format!("-t:{}", ms));
            }
        }
        command
    }
}

/// A cloneable handle that can terminate the solver process from another
/// thread. This is the only cancellation signal a worker understands; there
/// is no cooperative path into a solver stuck in quantifier instantiation.
#[derive(Clone)]
pub struct KillHandle {
    child: Arc<Mutex<Child>>,
}

impl KillHandle {
    pub fn kill(&self) {
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
        }
    }
}

/// An SMT solver spoken to over stdin/stdout in SMT-LIB, one process per
/// theory. Declarations and assertions are written without waiting; any
/// buffered solver errors surface at the next check.
pub struct PipedSolver {
    child: Arc<Mutex<Child>>,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl PipedSolver {
    pub fn spawn(config: &SolverConfig) -> Result<PipedSolver, SolverError> {
        let mut child = config
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SolverError::Spawn(config.program.clone(), e.to_string()))?;
        let stdin = child.stdin.take().expect("child stdin was piped");
        let stdout = BufReader::new(child.stdout.take().expect("child stdout was piped"));
        tracing::debug!(program = %config.program, pid = child.id(), "solver started");
        Ok(PipedSolver {
            child: Arc::new(Mutex::new(child)),
            stdin,
            stdout,
        })
    }

    pub fn kill_handle(&self) -> KillHandle {
        KillHandle {
            child: Arc::clone(&self.child),
        }
    }

    fn send(&mut self, command: &str) -> Result<(), SolverError> {
        tracing::trace!(command, "-> solver");
        writeln!(self.stdin, "{}", command)?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Reads lines until the solver answers a check.
    fn read_check_response(&mut self) -> Result<SatResult, SolverError> {
        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line)?;
            if n == 0 {
                return Err(SolverError::Io("solver closed the stream".to_string()));
            }
            let line = line.trim();
            tracing::trace!(line, "<- solver");
            match line {
                "" => continue,
                "sat" => return Ok(SatResult::Sat),
                "unsat" => return Ok(SatResult::Unsat),
                "unknown" => return Ok(SatResult::Unknown),
                _ if line.starts_with("(error") => {
                    return Err(SolverError::Solver(line.to_string()));
                }
                _ => return Err(SolverError::UnexpectedResponse(line.to_string())),
            }
        }
    }
}

impl SmtSolver for PipedSolver {
    fn declare(&mut self, decl: &SExpr) -> Result<(), SolverError> {
        self.send(&decl.to_string())
    }

    fn assert(&mut self, term: &SExpr) -> Result<(), SolverError> {
        self.send(&format!("(assert {})", term))
    }

    fn check(&mut self) -> Result<SatResult, SolverError> {
        self.send("(check-sat)")?;
        self.read_check_response()
    }

    fn check_assuming(&mut self, term: &SExpr) -> Result<SatResult, SolverError> {
        self.send("(push 1)")?;
        self.send(&format!("(assert {})", term))?;
        self.send("(check-sat)")?;
        let result = self.read_check_response()?;
        self.send("(pop 1)")?;
        Ok(result)
    }
}

impl Drop for PipedSolver {
    fn drop(&mut self) {
        // Never leak the child: kill is a no-op if it already exited, and the
        // wait reaps it either way.
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::parse_one;

    #[cfg(unix)]
    #[test]
    fn test_piped_solver_round_trip() {
        let mut solver = PipedSolver::spawn(&test_util::echo_solver("sat")).unwrap();
        let decl = parse_one("(declare-sort Person 0)").unwrap();
        solver.declare(&decl).unwrap();
        solver.assert(&parse_one("(p a)").unwrap()).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Sat);
        assert_eq!(
            solver
                .check_assuming(&parse_one("(q b)").unwrap())
                .unwrap(),
            SatResult::Sat
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_piped_solver_unknown() {
        let mut solver = PipedSolver::spawn(&test_util::echo_solver("unknown")).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Unknown);
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_breaks_the_pipe() {
        let mut solver = PipedSolver::spawn(&test_util::silent_solver()).unwrap();
        let handle = solver.kill_handle();
        handle.kill();
        // The check either sees a closed stream or a broken pipe.
        assert!(solver.check().is_err());
    }

    #[test]
    fn test_soft_timeout_flags() {
        fn args(config: &SolverConfig) -> Vec<String> {
            config
                .command()
                .get_args()
                .map(|a| a.to_string_lossy().into_owned())
                .collect()
        }

        let mut z3 = SolverConfig::z3();
        z3.soft_timeout = Some(Duration::from_secs(1));
        assert!(args(&z3).contains(&"-t:1000".to_string()));

        let mut cvc5 = SolverConfig::cvc5();
        cvc5.soft_timeout = Some(Duration::from_secs(1));
        assert!(args(&cvc5).contains(&"--tlimit-per=1000".to_string()));

        // An unrecognized solver gets no limit flag it might reject.
        let mut other = SolverConfig::for_program("yices-smt2");
        other.args.clear();
        other.soft_timeout = Some(Duration::from_secs(1));
        assert!(args(&other).is_empty());
    }

    #[test]
    fn test_spawn_failure() {
        let config = SolverConfig::for_program("definitely-not-a-solver-binary");
        match PipedSolver::spawn(&config) {
            Err(SolverError::Spawn(program, _)) => {
                assert_eq!(program, "definitely-not-a-solver-binary");
            }
            other => panic!("expected spawn failure, got {:?}", other.err()),
        }
    }
}
