//! The driver loop (spec.md §4.5), grounded on `MainLoop`/`HandleDefinition`/
//! `HandleExtern`/`HandleTopLevelExpression` in `examples/original_source/
//! sisp/sisp09.cpp`: read one top-level form, lower it, and in JIT mode
//! either keep its module resident (`def`/`extern`) or evaluate and
//! discard it (a bare expression).

use std::path::PathBuf;

use anyhow::{Context, Result};
use inkwell::context::Context as LlvmContext;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::OptimizationLevel;

use sisp_gen::{LlvmIrBuilder, LowerError, Lowerer};
use sisp_lex::{Lexer, Token};
use sisp_par::{CompilationContext, Function, Parser, Prototype, Type};
use sisp_util::diagnostic::{E_ARITY_MISMATCH, E_OPERATOR_NOT_FOUND, E_TYPE, E_UNKNOWN_NAME};
use sisp_util::{DiagnosticBuilder, FileId, Handler, SourceMap, Span};

use crate::cli::Cli;

pub struct Session<'a> {
    ctx: CompilationContext,
    handler: Handler,
    sources: SourceMap,
    source: String,
    file_id: FileId,
    cli: &'a Cli,
    llvm_ctx: LlvmContext,
}

/// What one trip through the `Def`/`Extern`/expression dispatch parsed,
/// carried out of the parsing block so the `Parser` (and its borrow of
/// `ctx`/`handler`) can be torn down before lowering needs them again.
enum Parsed {
    Function(Function),
    Extern(Prototype),
    Nothing,
}

impl<'a> Session<'a> {
    pub fn new(path: PathBuf, source: String, cli: &'a Cli) -> Result<Self> {
        let mut sources = SourceMap::new();
        let file_id = sources.add_file(path, source.clone());
        Ok(Self {
            ctx: CompilationContext::new(),
            handler: Handler::new(),
            sources,
            source,
            file_id,
            cli,
            llvm_ctx: LlvmContext::create(),
        })
    }

    pub fn had_errors(&self) -> bool {
        self.handler.has_errors()
    }

    /// Runs the whole read-eval loop, then (in object mode) writes the
    /// accumulated module to `cli.out`.
    pub fn run(&mut self) -> Result<()> {
        if self.cli.emit_tokens {
            dump_tokens(&self.source, self.file_id);
        }

        if self.cli.is_jit() {
            run_jit(&self.llvm_ctx, &self.source, self.file_id, &mut self.ctx, &mut self.handler, self.cli)?;
        } else {
            run_object(
                &self.llvm_ctx,
                &self.source,
                self.file_id,
                &mut self.ctx,
                &mut self.handler,
                self.cli,
            )?;
        }
        self.report_diagnostics();
        Ok(())
    }

    fn report_diagnostics(&self) {
        for diag in self.handler.diagnostics() {
            eprintln!("{}", diag.render(&self.sources));
        }
    }
}

fn dump_tokens(source: &str, file_id: FileId) {
    let mut lexer = Lexer::new(source, file_id);
    loop {
        let token = lexer.advance();
        let eof = token.is_eof();
        eprintln!("{token:?}");
        if eof {
            break;
        }
    }
}

/// Parses exactly one top-level form starting at `lexer`'s current
/// position, returning the next `Lexer` position alongside what was
/// parsed. `;` is consumed and reported as [`Parsed::Nothing`].
/// Dispatch mirrors spec.md §4.5 precisely: `def` / `extern` / anything
/// else.
fn parse_one<'src>(
    lexer: Lexer<'src>,
    ctx: &mut CompilationContext,
    handler: &mut Handler,
) -> (Lexer<'src>, Parsed) {
    let mut parser = Parser::with_lexer(lexer, ctx, handler);

    if matches!(parser.peek(), Token::Char(';')) {
        parser.skip_token();
        return (parser.into_lexer(), Parsed::Nothing);
    }

    let parsed = match parser.peek().clone() {
        Token::Def => match parser.parse_definition() {
            Some(function) => Parsed::Function(function),
            None => Parsed::Nothing,
        },
        Token::Extern => match parser.parse_extern() {
            Some(proto) => Parsed::Extern(proto),
            None => Parsed::Nothing,
        },
        _ => match parser.parse_top_level() {
            Some(function) => Parsed::Function(function),
            None => Parsed::Nothing,
        },
    };
    (parser.into_lexer(), parsed)
}

fn is_anon(function: &Function, ctx: &CompilationContext) -> bool {
    ctx.interner.resolve(function.proto.name).starts_with("__anon_expr")
}

/// spec.md §4.5's loop, specialized to object-file emission: every form
/// lowers into the one module the session owns for its whole lifetime;
/// top-level expressions are each given a distinct mangled name so that
/// accumulating several of them in one module never redefines
/// `__anon_expr` twice (see DESIGN.md).
fn run_object(
    llvm_ctx: &LlvmContext,
    source: &str,
    file_id: FileId,
    ctx: &mut CompilationContext,
    handler: &mut Handler,
    cli: &Cli,
) -> Result<()> {
    let mut builder = LlvmIrBuilder::new(llvm_ctx, "sisp_module")
        .map_err(|e| anyhow::anyhow!("failed to initialize LLVM backend: {e}"))?;
    let mut anon_count = 0u32;
    let mut lexer = Lexer::new(source, file_id);

    while !lexer.peek().is_eof() {
        let (next_lexer, parsed) = parse_one(lexer, ctx, handler);
        lexer = next_lexer;

        match parsed {
            Parsed::Function(mut function) => {
                if function.proto.operator.is_none() && is_anon(&function, ctx) {
                    if anon_count > 0 {
                        let mangled = format!("__anon_expr_{anon_count}");
                        function.proto.name = ctx.interner.intern(&mangled);
                    }
                    anon_count += 1;
                }
                lower_function(ctx, handler, &mut builder, function, cli);
            }
            Parsed::Extern(proto) => {
                if cli.emit_ast {
                    eprintln!("{proto:#?}");
                }
                lower_extern(ctx, &mut builder, &proto);
            }
            Parsed::Nothing => {}
        }
    }

    if !handler.has_errors() {
        builder
            .write_object_file(&cli.out)
            .with_context(|| format!("failed to write '{}'", cli.out.display()))?;
    }
    Ok(())
}

/// spec.md §4.5's loop in JIT mode: `def`/`extern` forms get their
/// module handed to the engine and kept resident; a bare expression gets
/// evaluated through `__anon_expr` and its module is removed immediately
/// after.
fn run_jit(
    llvm_ctx: &LlvmContext,
    source: &str,
    file_id: FileId,
    ctx: &mut CompilationContext,
    handler: &mut Handler,
    cli: &Cli,
) -> Result<()> {
    let first = LlvmIrBuilder::new(llvm_ctx, "sisp_jit_0")
        .map_err(|e| anyhow::anyhow!("failed to initialize LLVM backend: {e}"))?;
    let engine = first
        .module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| anyhow::anyhow!("failed to create JIT execution engine: {e}"))?;
    let mut module_count = 1u32;
    let mut lexer = Lexer::new(source, file_id);

    while !lexer.peek().is_eof() {
        let (next_lexer, parsed) = parse_one(lexer, ctx, handler);
        lexer = next_lexer;

        match parsed {
            Parsed::Function(function) => {
                let anon = is_anon(&function, ctx);
                let ret_type = function.proto.ret_type;
                let mut fresh = LlvmIrBuilder::new(llvm_ctx, &format!("sisp_jit_{module_count}"))
                    .map_err(|e| anyhow::anyhow!("failed to initialize LLVM backend: {e}"))?;
                module_count += 1;
                let ok = lower_function(ctx, handler, &mut fresh, function, cli);
                if !ok {
                    continue;
                }
                if !hand_off_module(&engine, &fresh.module, handler) {
                    continue;
                }
                if anon {
                    evaluate_anon_expr(&engine, ret_type);
                    let _ = engine.remove_module(&fresh.module);
                }
            }
            Parsed::Extern(proto) => {
                if cli.emit_ast {
                    eprintln!("{proto:#?}");
                }
                let mut fresh = LlvmIrBuilder::new(llvm_ctx, &format!("sisp_jit_{module_count}"))
                    .map_err(|e| anyhow::anyhow!("failed to initialize LLVM backend: {e}"))?;
                module_count += 1;
                lower_extern(ctx, &mut fresh, &proto);
                hand_off_module(&engine, &fresh.module, handler);
            }
            Parsed::Nothing => {}
        }
    }

    Ok(())
}

/// Lowers `function` into `builder`; returns whether it succeeded. A
/// failure is recorded as a diagnostic rather than propagated — lowering
/// errors abort only the function that raised them (spec.md §7), so the
/// driver keeps going either way.
fn lower_function(
    ctx: &mut CompilationContext,
    handler: &mut Handler,
    builder: &mut LlvmIrBuilder<'_>,
    function: Function,
    cli: &Cli,
) -> bool {
    if cli.emit_ast {
        eprintln!("{:#?}", function.proto);
    }
    if cli.verbose {
        eprintln!("lowering `{}`", ctx.interner.resolve(function.proto.name));
    }
    let proto = function.proto.clone();
    let mut scopes = function.scopes;
    let mut lowerer = Lowerer::new(builder, ctx, &mut scopes);
    match lowerer.lower_function(&proto, &function.body) {
        Ok(_) => true,
        Err(e) => {
            report_lower_error(handler, e, proto.span);
            false
        }
    }
}

fn lower_extern(ctx: &mut CompilationContext, builder: &mut LlvmIrBuilder<'_>, proto: &Prototype) {
    let mut scopes = sisp_scope::ScopeTree::new();
    let mut lowerer = Lowerer::new(builder, ctx, &mut scopes);
    lowerer.lower_extern(proto);
}

fn report_lower_error(handler: &mut Handler, err: LowerError, span: Span) {
    let code = match &err {
        LowerError::UnknownName(_) => Some(E_UNKNOWN_NAME),
        LowerError::ArityMismatch(..) => Some(E_ARITY_MISMATCH),
        LowerError::OperatorNotFound(_) => Some(E_OPERATOR_NOT_FOUND),
        LowerError::TypeMismatch(_) => Some(E_TYPE),
        LowerError::VerificationFailed(..) | LowerError::LlvmOperationFailed(_) => None,
    };
    let mut diag = DiagnosticBuilder::error(err.to_string()).span(span);
    if let Some(code) = code {
        diag = diag.code(code);
    }
    handler.emit(diag.build());
}

/// Hands `module` off to `engine`; returns whether it was accepted. The
/// only failure mode is a module already owned by an `ExecutionEngine`,
/// which cannot happen here since every module is freshly created.
fn hand_off_module<'ctx>(
    engine: &ExecutionEngine<'ctx>,
    module: &inkwell::module::Module<'ctx>,
    handler: &mut Handler,
) -> bool {
    if engine.add_module(module).is_ok() {
        true
    } else {
        handler.emit(DiagnosticBuilder::error("module already owned by the JIT engine").build());
        false
    }
}

/// Looks up `__anon_expr` in the engine, invokes it, and prints its value
/// the way spec.md §8's scenario table expects: a plain integer for
/// `Int64`, a decimal-bearing float for `Float64`, `true`/`false` for
/// `Bool`, and `0` for `Void` (the sentinel a statement with no value —
/// such as scenario 6's `printd` call — lowers to). This prints to
/// stdout rather than the original's stderr; see DESIGN.md.
fn evaluate_anon_expr(engine: &ExecutionEngine<'_>, ret_type: Type) {
    let Ok(addr) = engine.get_function_address("__anon_expr") else {
        return;
    };
    // SAFETY: `__anon_expr` was declared and lowered by this same JIT
    // pass with the signature `fn() -> <ret_type>`, so the transmuted
    // function pointer below matches the symbol actually compiled.
    unsafe {
        match ret_type {
            Type::Int64 => {
                let f: extern "C" fn() -> i64 = std::mem::transmute(addr);
                println!("{}", f());
            }
            Type::Float64 => {
                let f: extern "C" fn() -> f64 = std::mem::transmute(addr);
                println!("{:?}", f());
            }
            Type::Bool => {
                let f: extern "C" fn() -> bool = std::mem::transmute(addr);
                println!("{}", f());
            }
            Type::Void => {
                let f: extern "C" fn() -> i8 = std::mem::transmute(addr);
                println!("{}", f());
            }
        }
    }
}
