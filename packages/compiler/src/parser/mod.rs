//! Recursive-descent, Pratt-style expression parser (spec §4.2).
//!
//! Precedence ladder, highest-binding last before primaries:
//! assignment → ternary → logical-or → logical-and → bitwise-or/xor/and →
//! equality → relational → shift → additive → multiplicative → `as`/`is`/
//! `has` → prefix → postfix/call/subscript/member → primary.

use crate::ast::contract::{Cont, ContKind};
use crate::ast::decl::{
    ConstructorKind, Decl, DeclKind, FunctionSig, Modifiers, OperatorFixity, ParamKind, Parameter,
    StructKind, TemplateParam, TemplateParamKind, Visibility,
};
use crate::ast::expr::{BinOp, Expr, ExprKind, LabeledArgument, Literal, PrefixOp};
use crate::ast::stmt::{CatchClause, Stmt, StmtKind, SwitchCase};
use crate::ast::types::{ArgTuple, Qualifier, TypeKind, TypeNode};
use crate::ast::{ContId, DeclId, ExprId, StmtId, TypeId};
use crate::diagnostics::{CompileError, ErrorKind, Phase, SourceRange};
use crate::ident::Identifier;
use crate::lexer::{Lexer, TokenKind};
use crate::session::{AstFile, Session};
use smallvec::smallvec;

pub struct Parser<'a, 'src> {
    lexer: Lexer<'src>,
    session: &'a mut Session,
    file: String,
}

type PResult<T> = Result<T, CompileError>;

impl<'a, 'src> Parser<'a, 'src> {
    pub fn new(source: &'src str, file: impl Into<String>, session: &'a mut Session) -> Self {
        let file = file.into();
        Parser { lexer: Lexer::new(source, file.clone()), session, file }
    }

    fn err(&self, range: SourceRange, kind: ErrorKind) -> CompileError {
        CompileError::fatal(Phase::Parse, self.file.clone(), range, kind)
    }

    fn peek(&mut self) -> PResult<TokenKind> {
        Ok(self.lexer.peek()?.kind)
    }

    fn peek_range(&mut self) -> PResult<SourceRange> {
        Ok(self.lexer.peek()?.range)
    }

    fn bump(&mut self) -> PResult<crate::lexer::Token> {
        self.lexer.next_token()
    }

    fn eat_keyword(&mut self, kw: &str) -> PResult<bool> {
        if matches!(self.peek()?, TokenKind::Keyword(ref k) if k == kw) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> PResult<SourceRange> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Keyword(ref k) if k == kw => Ok(tok.range),
            other => Err(self.err(tok.range, ErrorKind::UnexpectedToken(format!("expected `{kw}`, found {other:?}")))),
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> PResult<bool> {
        if &self.peek()? == kind {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<SourceRange> {
        let tok = self.bump()?;
        if tok.kind == kind {
            Ok(tok.range)
        } else {
            Err(self.err(tok.range, ErrorKind::UnexpectedToken(format!("expected {kind:?}, found {:?}", tok.kind))))
        }
    }

    fn expect_identifier(&mut self) -> PResult<Identifier> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Identifier(name) => Ok(Identifier::new(name, tok.range)),
            other => Err(self.err(tok.range, ErrorKind::UnexpectedToken(format!("expected identifier, found {other:?}")))),
        }
    }

    // ---------------------------------------------------------------
    // File / declarations
    // ---------------------------------------------------------------

    pub fn parse_file(mut self) -> PResult<AstFile> {
        let mut top_level = Vec::new();
        while self.peek()? != TokenKind::Eof {
            top_level.push(self.parse_decl()?);
        }
        Ok(AstFile { path: self.file.clone(), top_level })
    }

    fn parse_modifiers(&mut self) -> PResult<(Visibility, Modifiers)> {
        let mut visibility = Visibility::Unassigned;
        let mut modifiers = Modifiers::empty();
        loop {
            let kind = self.peek()?;
            let kw = match &kind {
                TokenKind::Keyword(k) => k.clone(),
                _ => break,
            };
            match kw.as_str() {
                "public" => { visibility = Visibility::Public; self.bump()?; }
                "private" => { visibility = Visibility::Private; self.bump()?; }
                "protected" => {
                    self.bump()?;
                    if self.eat_keyword("internal")? {
                        visibility = Visibility::ProtectedInternal;
                    } else {
                        visibility = Visibility::Protected;
                    }
                }
                "internal" => { visibility = Visibility::Internal; self.bump()?; }
                "static" => { modifiers |= Modifiers::STATIC; self.bump()?; }
                "extern" => { modifiers |= Modifiers::EXTERN; self.bump()?; }
                "mut" => { modifiers |= Modifiers::MUT; self.bump()?; }
                "volatile" => { modifiers |= Modifiers::VOLATILE; self.bump()?; }
                "abstract" => { modifiers |= Modifiers::ABSTRACT; self.bump()?; }
                "virtual" => { modifiers |= Modifiers::VIRTUAL; self.bump()?; }
                "override" => { modifiers |= Modifiers::OVERRIDE; self.bump()?; }
                "const" => { modifiers |= Modifiers::CONST_EXPR; self.bump()?; }
                _ => break,
            }
        }
        Ok((visibility, modifiers))
    }

    fn parse_decl(&mut self) -> PResult<DeclId> {
        // Attributes are parsed and discarded into the (unused-here) attr
        // arena: spec §4.2 defers their resolution to an unspecified pass.
        while self.peek()? == TokenKind::LBracket {
            self.parse_attribute()?;
        }
        let (visibility, modifiers) = self.parse_modifiers()?;
        let start = self.peek_range()?;
        let kw = match self.peek()? {
            TokenKind::Keyword(k) => k,
            other => return Err(self.err(start, ErrorKind::UnexpectedToken(format!("expected declaration, found {other:?}")))),
        };
        match kw.as_str() {
            "namespace" => self.parse_namespace(visibility, modifiers, start),
            "import" => self.parse_import(start),
            "struct" => self.parse_struct(StructKind::Struct, visibility, modifiers, start),
            "class" => self.parse_struct(StructKind::Class, visibility, modifiers, start),
            "union" => self.parse_struct(StructKind::Union, visibility, modifiers, start),
            "trait" => self.parse_trait(visibility, modifiers, start),
            "enum" => self.parse_enum(visibility, modifiers, start),
            "extension" => self.parse_extension(visibility, modifiers, start),
            "func" => self.parse_function(visibility, modifiers, start),
            "operator" => self.parse_operator(visibility, modifiers, start),
            "call" => self.parse_call_operator(visibility, modifiers, start),
            "subscript" => self.parse_subscript(visibility, modifiers, start),
            "property" => self.parse_property(visibility, modifiers, start),
            "init" => self.parse_constructor(visibility, modifiers, start),
            "deinit" => self.parse_destructor(visibility, modifiers, start),
            "typealias" => self.parse_type_alias(visibility, modifiers, start),
            "typesuffix" => self.parse_type_suffix(visibility, modifiers, start),
            "var" | "let" => self.parse_variable(visibility, modifiers, start),
            _ => Err(self.err(start, ErrorKind::UnexpectedToken(format!("unexpected declaration keyword `{kw}`")))),
        }
    }

    fn parse_attribute(&mut self) -> PResult<()> {
        self.expect(TokenKind::LBracket)?;
        loop {
            let _name = self.expect_identifier()?;
            if self.eat(&TokenKind::LParen)? {
                if self.peek()? != TokenKind::RParen {
                    loop {
                        self.parse_expr()?;
                        if !self.eat(&TokenKind::Comma)? {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
            }
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(())
    }

    fn parse_namespace(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("namespace")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while self.peek()? != TokenKind::RBrace {
            members.push(self.parse_decl()?);
        }
        let end = self.expect(TokenKind::RBrace)?;
        let decl = Decl::new(DeclKind::Namespace { name, members }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_import(&mut self, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("import")?;
        let mut path = vec![self.expect_identifier()?];
        while self.eat(&TokenKind::Dot)? {
            path.push(self.expect_identifier()?);
        }
        let alias = if self.eat_keyword("as")? { Some(self.expect_identifier()?) } else { None };
        let end = self.expect(TokenKind::Semicolon)?;
        let decl = Decl::new(
            DeclKind::Import { path, alias, resolved: None },
            Visibility::Unassigned,
            Modifiers::empty(),
            span(start, end),
        );
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_template_param_list(&mut self) -> PResult<Vec<DeclId>> {
        if !self.eat(&TokenKind::Less)? {
            return Ok(Vec::new());
        }
        self.lexer.set_right_shift_enabled(false);
        let mut params = Vec::new();
        loop {
            let pstart = self.peek_range()?;
            if self.eat_keyword("const")? {
                let name = self.expect_identifier()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                let decl = Decl::new(
                    DeclKind::TemplateParameter(TemplateParam { name, kind: TemplateParamKind::ConstValue, constraint_or_type: vec![ty] }),
                    Visibility::Unassigned,
                    Modifiers::empty(),
                    pstart,
                );
                params.push(self.session.decls.alloc(decl));
            } else {
                let name = self.expect_identifier()?;
                let mut constraints = Vec::new();
                if self.eat(&TokenKind::Colon)? {
                    constraints.push(self.parse_type()?);
                    while self.eat(&TokenKind::Amp)? {
                        constraints.push(self.parse_type()?);
                    }
                }
                let decl = Decl::new(
                    DeclKind::TemplateParameter(TemplateParam { name, kind: TemplateParamKind::Typename, constraint_or_type: constraints }),
                    Visibility::Unassigned,
                    Modifiers::empty(),
                    pstart,
                );
                params.push(self.session.decls.alloc(decl));
            }
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.lexer.set_right_shift_enabled(true);
        self.expect(TokenKind::TemplateEnd)?;
        Ok(params)
    }

    fn parse_inherits(&mut self) -> PResult<Vec<TypeId>> {
        let mut inherited = Vec::new();
        if self.eat(&TokenKind::Colon)? {
            inherited.push(self.parse_type()?);
            while self.eat(&TokenKind::Comma)? {
                inherited.push(self.parse_type()?);
            }
        }
        Ok(inherited)
    }

    fn parse_contracts(&mut self) -> PResult<Vec<ContId>> {
        let mut conts = Vec::new();
        loop {
            let cstart = self.peek_range()?;
            if self.eat_keyword("where")? {
                let e = self.parse_expr()?;
                conts.push(self.session.conts.alloc(Cont::new(ContKind::Where(e), cstart)));
            } else if self.eat_keyword("requires")? {
                let e = self.parse_expr()?;
                conts.push(self.session.conts.alloc(Cont::new(ContKind::Requires(e), cstart)));
            } else if self.eat_keyword("ensures")? {
                let e = self.parse_expr()?;
                conts.push(self.session.conts.alloc(Cont::new(ContKind::Ensures(e), cstart)));
            } else if self.eat_keyword("throws")? {
                let ty = if matches!(self.peek()?, TokenKind::Identifier(_)) { Some(self.parse_type()?) } else { None };
                conts.push(self.session.conts.alloc(Cont::new(ContKind::Throws(ty), cstart)));
            } else {
                break;
            }
        }
        Ok(conts)
    }

    fn parse_struct(&mut self, kind: StructKind, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.bump()?; // struct/class/union
        let name = self.expect_identifier()?;
        let template_params = self.parse_template_param_list()?;
        let inherited = self.parse_inherits()?;
        let conts = self.parse_contracts()?;
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while self.peek()? != TokenKind::RBrace {
            members.push(self.parse_decl()?);
        }
        let end = self.expect(TokenKind::RBrace)?;
        let range = span(start, end);

        if template_params.is_empty() {
            let decl = Decl::new(
                DeclKind::Struct { name, kind, inherited, members, vtable: Vec::new(), cached_copy_constructor: None, cached_move_constructor: None },
                visibility,
                modifiers,
                range,
            );
            Ok(self.session.decls.alloc(decl))
        } else {
            let instantiations = Default::default();
            let decl = Decl::new(
                DeclKind::TemplateStruct { name, params: template_params, kind, inherited, members, where_conts: conts, instantiations },
                visibility,
                modifiers,
                range,
            );
            Ok(self.session.decls.alloc(decl))
        }
    }

    fn parse_trait(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("trait")?;
        let name = self.expect_identifier()?;
        let template_params = self.parse_template_param_list()?;
        let inherited = self.parse_inherits()?;
        let conts = self.parse_contracts()?;
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while self.peek()? != TokenKind::RBrace {
            members.push(self.parse_decl()?);
        }
        let end = self.expect(TokenKind::RBrace)?;
        let range = span(start, end);
        if template_params.is_empty() {
            let decl = Decl::new(DeclKind::Trait { name, inherited, members }, visibility, modifiers, range);
            Ok(self.session.decls.alloc(decl))
        } else {
            let decl = Decl::new(
                DeclKind::TemplateTrait { name, params: template_params, inherited, members, where_conts: conts, instantiations: Default::default() },
                visibility,
                modifiers,
                range,
            );
            Ok(self.session.decls.alloc(decl))
        }
    }

    fn parse_enum(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("enum")?;
        let name = self.expect_identifier()?;
        let underlying = if self.eat(&TokenKind::Colon)? { Some(self.parse_type()?) } else { None };
        self.expect(TokenKind::LBrace)?;
        let mut consts = Vec::new();
        while self.peek()? != TokenKind::RBrace {
            let cstart = self.peek_range()?;
            self.eat_keyword("case")?;
            let cname = self.expect_identifier()?;
            let value = if self.eat(&TokenKind::Eq)? { Some(self.parse_expr()?) } else { None };
            let end = self.lexer.peek()?.range;
            let _ = self.eat(&TokenKind::Comma)?;
            let decl = Decl::new(DeclKind::EnumConst { name: cname, value }, Visibility::Public, Modifiers::empty(), span(cstart, end));
            consts.push(self.session.decls.alloc(decl));
        }
        let end = self.expect(TokenKind::RBrace)?;
        let decl = Decl::new(DeclKind::Enum { name, underlying, consts }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_extension(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("extension")?;
        let target = self.parse_type()?;
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while self.peek()? != TokenKind::RBrace {
            members.push(self.parse_decl()?);
        }
        let end = self.expect(TokenKind::RBrace)?;
        let decl = Decl::new(DeclKind::Extension { target, members }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_param_list(&mut self) -> PResult<Vec<Parameter>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while self.peek()? != TokenKind::RParen {
            let kind = if self.eat_keyword("in")? {
                ParamKind::In
            } else if self.eat_keyword("out")? {
                ParamKind::Out
            } else if self.eat_keyword("inout")? {
                ParamKind::InOut
            } else {
                self.eat_keyword("val")?;
                ParamKind::Val
            };
            let label = if matches!(self.peek()?, TokenKind::Identifier(_)) {
                // Two identifiers in a row means `label name`.
                let first = self.expect_identifier()?;
                if matches!(self.peek()?, TokenKind::Identifier(_)) {
                    Some(first)
                } else {
                    // single identifier: it's the parameter name, label == name
                    let ty = { self.expect(TokenKind::Colon)?; self.parse_type()? };
                    let default_value = if self.eat(&TokenKind::Eq)? { Some(self.parse_expr()?) } else { None };
                    params.push(Parameter { label: Some(first.clone()), name: first, kind, ty, default_value });
                    if !self.eat(&TokenKind::Comma)? {
                        break;
                    }
                    continue;
                }
            } else if self.eat(&TokenKind::At)? {
                Some(self.expect_identifier()?)
            } else {
                None
            };
            let name = self.expect_identifier()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            let default_value = if self.eat(&TokenKind::Eq)? { Some(self.parse_expr()?) } else { None };
            params.push(Parameter { label, name, kind, ty, default_value });
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_block(&mut self) -> PResult<StmtId> {
        let start = self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while self.peek()? != TokenKind::RBrace {
            body.push(self.parse_stmt()?);
        }
        let end = self.expect(TokenKind::RBrace)?;
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Compound { body, temporaries: Vec::new() }, span(start, end))))
    }

    fn parse_body(&mut self) -> PResult<Option<StmtId>> {
        if self.eat(&TokenKind::Semicolon)? {
            Ok(None)
        } else {
            Ok(Some(self.parse_block()?))
        }
    }

    fn parse_function(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("func")?;
        let name = self.expect_identifier()?;
        let template_params = self.parse_template_param_list()?;
        let params = self.parse_param_list()?;
        let return_type = if self.eat(&TokenKind::Minus)? {
            // `->` is lexed as Minus then Greater/TemplateEnd; accept both split forms.
            let _ = self.eat(&TokenKind::TemplateEnd)?;
            self.parse_type()?
        } else {
            self.unit_type()
        };
        let contracts = self.parse_contracts()?;
        let body = self.parse_body()?;
        let end = self.current_end(start);
        let sig = FunctionSig { params, return_type, contracts, body };
        if template_params.is_empty() {
            let decl = Decl::new(DeclKind::Function { name, sig }, visibility, modifiers, span(start, end));
            Ok(self.session.decls.alloc(decl))
        } else {
            let decl = Decl::new(
                DeclKind::TemplateFunction { name, params: template_params, sig, instantiations: Default::default() },
                visibility,
                modifiers,
                span(start, end),
            );
            Ok(self.session.decls.alloc(decl))
        }
    }

    fn current_end(&mut self, fallback: SourceRange) -> SourceRange {
        self.lexer.peek().map(|t| t.range).unwrap_or(fallback)
    }

    fn unit_type(&mut self) -> TypeId {
        self.session.types.alloc(TypeNode::new(TypeKind::BuiltIn(crate::ast::types::BuiltIn { name: "void", size_bytes: 0, signed: None, floating: false })))
    }

    fn parse_operator(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("operator")?;
        let fix = if self.eat_keyword("prefix")? {
            OperatorFixity::Prefix
        } else if self.eat_keyword("postfix")? {
            OperatorFixity::Postfix
        } else {
            self.eat_keyword("infix")?;
            OperatorFixity::Infix
        };
        let symbol_tok = self.bump()?;
        let symbol = symbol_tok.kind.describe();
        let params = self.parse_param_list()?;
        let return_type = if self.eat(&TokenKind::Minus)? {
            let _ = self.eat(&TokenKind::TemplateEnd)?;
            self.parse_type()?
        } else {
            self.unit_type()
        };
        let contracts = self.parse_contracts()?;
        let body = self.parse_body()?;
        let end = self.current_end(start);
        let sig = FunctionSig { params, return_type, contracts, body };
        let decl = Decl::new(DeclKind::Operator { fix, symbol, sig }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_call_operator(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("call")?;
        let params = self.parse_param_list()?;
        let return_type = if self.eat(&TokenKind::Minus)? {
            let _ = self.eat(&TokenKind::TemplateEnd)?;
            self.parse_type()?
        } else {
            self.unit_type()
        };
        let contracts = self.parse_contracts()?;
        let body = self.parse_body()?;
        let end = self.current_end(start);
        let sig = FunctionSig { params, return_type, contracts, body };
        let decl = Decl::new(DeclKind::CallOperator { sig }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_get_set(&mut self) -> PResult<(Option<DeclId>, Option<DeclId>)> {
        self.expect(TokenKind::LBrace)?;
        let mut getter = None;
        let mut setter = None;
        while self.peek()? != TokenKind::RBrace {
            let gstart = self.peek_range()?;
            if self.eat_keyword("get")? {
                let mut is_ref = false;
                let mut is_ref_mut = false;
                if self.eat_keyword("ref")? {
                    is_ref = true;
                    is_ref_mut = self.eat_keyword("mut")?;
                }
                let body = self.parse_body()?;
                let end = self.current_end(gstart);
                getter = Some(self.session.decls.alloc(Decl::new(
                    DeclKind::Getter { is_ref, is_ref_mut, body },
                    Visibility::Unassigned,
                    Modifiers::empty(),
                    span(gstart, end),
                )));
            } else if self.eat_keyword("set")? {
                let body = self.parse_body()?;
                let end = self.current_end(gstart);
                setter = Some(self.session.decls.alloc(Decl::new(
                    DeclKind::Setter { body },
                    Visibility::Unassigned,
                    Modifiers::empty(),
                    span(gstart, end),
                )));
            } else {
                return Err(self.err(gstart, ErrorKind::UnexpectedToken("expected `get` or `set`".into())));
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok((getter, setter))
    }

    fn parse_subscript(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("subscript")?;
        let params = self.parse_param_list()?;
        self.expect(TokenKind::Minus)?;
        let _ = self.eat(&TokenKind::TemplateEnd)?;
        let element_type = self.parse_type()?;
        let (getter, setter) = self.parse_get_set()?;
        let end = self.current_end(start);
        let decl = Decl::new(DeclKind::SubscriptOperator { params, element_type, getter, setter }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_property(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("property")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let (getter, setter) = self.parse_get_set()?;
        let end = self.current_end(start);
        let decl = Decl::new(DeclKind::Property { name, ty, getter, setter }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_constructor(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("init")?;
        let sub_kind = if self.eat_keyword("copy")? {
            ConstructorKind::Copy
        } else if self.eat_keyword("move")? {
            ConstructorKind::Move
        } else {
            ConstructorKind::Normal
        };
        let params = self.parse_param_list()?;
        let contracts = self.parse_contracts()?;
        let void_ty = self.unit_type();
        let base_init = None;
        let body = self.parse_body()?;
        let end = self.current_end(start);
        let sig = FunctionSig { params, return_type: void_ty, contracts, body };
        let decl = Decl::new(DeclKind::Constructor { sub_kind, sig, base_init }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_destructor(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("deinit")?;
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_body()?;
        let end = self.current_end(start);
        let decl = Decl::new(DeclKind::Destructor { body }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_type_alias(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("typealias")?;
        let is_prefix = self.eat_keyword("prefix")?;
        let name = self.expect_identifier()?;
        let params = self.parse_template_param_list()?;
        self.expect(TokenKind::Eq)?;
        let aliased = self.parse_type()?;
        let end = self.expect(TokenKind::Semicolon)?;
        let decl = Decl::new(DeclKind::TypeAlias { name, params, aliased, is_prefix }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_type_suffix(&mut self, visibility: Visibility, modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        self.expect_keyword("typesuffix")?;
        let name = self.expect_identifier()?;
        let params = self.parse_param_list()?;
        self.expect(TokenKind::Minus)?;
        let _ = self.eat(&TokenKind::TemplateEnd)?;
        let return_type = self.parse_type()?;
        let body = self.parse_body()?;
        let end = self.current_end(start);
        let decl = Decl::new(DeclKind::TypeSuffix { name, params, return_type, body }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    fn parse_variable(&mut self, visibility: Visibility, mut modifiers: Modifiers, start: SourceRange) -> PResult<DeclId> {
        let is_let = self.eat_keyword("let")?;
        if !is_let {
            self.expect_keyword("var")?;
        } else {
            modifiers |= Modifiers::CONST_EXPR | Modifiers::MUT;
            modifiers.remove(Modifiers::MUT); // `let` is immutable; CONST_EXPR retained only if `const` also present
            modifiers.remove(Modifiers::CONST_EXPR);
        }
        let name = self.expect_identifier()?;
        let ty = if self.eat(&TokenKind::Colon)? { self.parse_type()? } else { self.unit_type() };
        let initializer = if self.eat(&TokenKind::Eq)? { Some(self.parse_expr()?) } else { None };
        let end = self.expect(TokenKind::Semicolon)?;
        let decl = Decl::new(DeclKind::Variable { name, ty, initializer }, visibility, modifiers, span(start, end));
        Ok(self.session.decls.alloc(decl))
    }

    // ---------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------

    pub fn parse_type(&mut self) -> PResult<TypeId> {
        let mut qualifier = Qualifier::Unassigned;
        if self.eat_keyword("mut")? {
            qualifier = Qualifier::Mut;
        } else if self.eat_keyword("immut")? {
            qualifier = Qualifier::Immut;
        }

        if self.eat_keyword("ref")? {
            let inner = self.parse_type()?;
            return Ok(self.session.types.alloc(TypeNode::with_qualifier(TypeKind::Reference { inner }, qualifier)));
        }
        if self.eat(&TokenKind::Star)? {
            let inner = self.parse_type()?;
            return Ok(self.session.types.alloc(TypeNode::with_qualifier(TypeKind::Pointer { inner }, qualifier)));
        }

        let mut base = self.parse_type_primary(qualifier)?;

        loop {
            if self.eat(&TokenKind::LBracket)? {
                if self.peek()? == TokenKind::RBracket {
                    self.bump()?;
                    base = self.session.types.alloc(TypeNode::new(TypeKind::FlatArray { element: base, length_const: None }));
                } else if self.peek()? == TokenKind::Comma {
                    let mut rank = 1u32;
                    while self.eat(&TokenKind::Comma)? {
                        rank += 1;
                    }
                    self.expect(TokenKind::RBracket)?;
                    base = self.session.types.alloc(TypeNode::new(TypeKind::Dimension { inner: base, rank }));
                } else {
                    let len_expr = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    let len_const = crate::const_eval::eval(self.session, len_expr, &Default::default());
                    base = self.session.types.alloc(TypeNode::new(TypeKind::FlatArray { element: base, length_const: len_const }));
                }
            } else {
                break;
            }
        }
        Ok(base)
    }

    fn parse_type_primary(&mut self, qualifier: Qualifier) -> PResult<TypeId> {
        let tok = self.bump()?;
        let (mut path, mut name) = (Vec::new(), match tok.kind {
            TokenKind::Identifier(ref s) if s == "Self" => {
                return Ok(self.session.types.alloc(TypeNode::with_qualifier(TypeKind::SelfType, qualifier)));
            }
            TokenKind::Identifier(s) => Identifier::new(s, tok.range),
            other => return Err(self.err(tok.range, ErrorKind::UnexpectedToken(format!("expected type, found {other:?}")))),
        });
        while self.eat(&TokenKind::Dot)? {
            path.push(name);
            name = self.expect_identifier()?;
        }

        let args = self.parse_optional_template_args()?;

        if path.is_empty() {
            if args.is_empty() {
                if let Some(kind) = crate::ast::types::lookup_builtin(&name.name) {
                    return Ok(self.session.types.alloc(TypeNode::with_qualifier(kind, qualifier)));
                }
            }
            Ok(self.session.types.alloc(TypeNode::with_qualifier(TypeKind::Unresolved { path, name, args }, qualifier)))
        } else {
            Ok(self.session.types.alloc(TypeNode::with_qualifier(TypeKind::Unresolved { path, name, args }, qualifier)))
        }
    }

    /// Speculatively parses `<Args...>` as template arguments; rewinds on
    /// failure so `a < b` is not misread as the start of a template list.
    fn parse_optional_template_args(&mut self) -> PResult<ArgTuple> {
        if self.peek()? != TokenKind::Less {
            return Ok(smallvec![]);
        }
        self.lexer.checkpoint();
        self.bump()?;
        self.lexer.set_right_shift_enabled(false);
        let result: PResult<ArgTuple> = (|| {
            let mut args = ArgTuple::new();
            if self.peek()? == TokenKind::TemplateEnd {
                return Ok(args);
            }
            loop {
                args.push(self.parse_template_arg()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::TemplateEnd)?;
            Ok(args)
        })();
        self.lexer.set_right_shift_enabled(true);
        match result {
            Ok(args) => {
                self.lexer.commit();
                Ok(args)
            }
            Err(_) => {
                self.lexer.rewind();
                Ok(smallvec![])
            }
        }
    }

    fn parse_template_arg(&mut self) -> PResult<crate::ast::types::TemplateArg> {
        // A const argument starts with a literal or `-`; otherwise it's a type.
        match self.peek()? {
            TokenKind::IntLiteral { .. } | TokenKind::FloatLiteral { .. } | TokenKind::StringLiteral(_) | TokenKind::CharLiteral(_) | TokenKind::Minus => {
                let e = self.parse_expr()?;
                let v = crate::const_eval::eval(self.session, e, &Default::default());
                match v {
                    Some(v) => Ok(crate::ast::types::TemplateArg::Const(v)),
                    None => Err(self.err(self.session.exprs.get(e).range, ErrorKind::IllegalLiteral("non-constant template argument".into()))),
                }
            }
            _ => Ok(crate::ast::types::TemplateArg::Type(self.parse_type()?)),
        }
    }

    // ---------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------

    fn parse_stmt(&mut self) -> PResult<StmtId> {
        let start = self.peek_range()?;
        match self.peek()? {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Keyword(kw) => match kw.as_str() {
                "if" => self.parse_if(start),
                "while" => self.parse_while(start),
                "do" => self.parse_do(start),
                "for" => self.parse_for(start),
                "switch" => self.parse_switch(start),
                "fallthrough" => { self.bump()?; let end = self.expect(TokenKind::Semicolon)?; Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Fallthrough, span(start, end)))) }
                "break" => self.parse_break(start),
                "continue" => self.parse_continue(start),
                "goto" => self.parse_goto(start),
                "return" => self.parse_return(start),
                "var" | "let" => {
                    let decl = self.parse_variable(Visibility::Unassigned, Modifiers::empty(), start)?;
                    let end = self.session.decls.get(decl).range;
                    Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Decl(decl), end)))
                }
                _ => self.parse_expr_stmt(start),
            },
            TokenKind::Identifier(name) => {
                // `label: stmt`
                self.lexer.checkpoint();
                let _ = self.bump()?;
                if self.peek()? == TokenKind::Colon {
                    self.bump()?;
                    self.lexer.commit();
                    let inner = self.parse_stmt()?;
                    let end = self.session.stmts.get(inner).range;
                    let label = Identifier::new(name, start);
                    return Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Labeled { label, stmt: inner }, span(start, end))));
                }
                self.lexer.rewind();
                self.parse_expr_stmt(start)
            }
            _ => self.parse_expr_stmt(start),
        }
    }

    fn parse_expr_stmt(&mut self, start: SourceRange) -> PResult<StmtId> {
        let e = self.parse_expr()?;
        let end = self.expect(TokenKind::Semicolon)?;
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Expr(e), span(start, end))))
    }

    fn parse_if(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("if")?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.parse_block_or_stmt()?;
        let else_branch = if self.eat_keyword("else")? { Some(self.parse_block_or_stmt()?) } else { None };
        let end = self.current_end(start);
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::If { cond, then_branch, else_branch }, span(start, end))))
    }

    fn parse_block_or_stmt(&mut self) -> PResult<StmtId> {
        if self.peek()? == TokenKind::LBrace {
            self.parse_block()
        } else {
            self.parse_stmt()
        }
    }

    fn parse_while(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("while")?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block_or_stmt()?;
        let end = self.current_end(start);
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::While { cond, body }, span(start, end))))
    }

    fn parse_do(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("do")?;
        if self.peek()? != TokenKind::LBrace {
            return Err(self.err(start, ErrorKind::UnexpectedToken("expected `{` after `do`".into())));
        }
        let body = self.parse_block()?;
        if self.eat_keyword("while")? {
            self.expect(TokenKind::LParen)?;
            let cond = self.parse_expr()?;
            self.expect(TokenKind::RParen)?;
            let end = self.expect(TokenKind::Semicolon)?;
            return Ok(self.session.stmts.alloc(Stmt::new(StmtKind::DoWhile { body, cond }, span(start, end))));
        }
        // do { ... } catch (...) { ... } [finally { ... }]
        let mut catches = Vec::new();
        while self.eat_keyword("catch")? {
            let mut exception_type = None;
            let mut binding = None;
            if self.eat(&TokenKind::LParen)? {
                exception_type = Some(self.parse_type()?);
                if matches!(self.peek()?, TokenKind::Identifier(_)) {
                    binding = Some(self.expect_identifier()?);
                }
                self.expect(TokenKind::RParen)?;
            }
            let cbody = self.parse_block()?;
            catches.push(CatchClause { exception_type, binding, body: cbody });
        }
        let finally = if self.eat_keyword("finally")? { Some(self.parse_block()?) } else { None };
        let end = self.current_end(start);
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::DoCatch { body, catches, finally }, span(start, end))))
    }

    fn parse_for(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("for")?;
        self.expect(TokenKind::LParen)?;
        let init = if self.peek()? == TokenKind::Semicolon {
            self.bump()?;
            None
        } else if self.eat_keyword("var")? || self.eat_keyword("let")? {
            let istart = self.peek_range()?;
            let name = self.expect_identifier()?;
            let ty = if self.eat(&TokenKind::Colon)? { self.parse_type()? } else { self.unit_type() };
            let initializer = if self.eat(&TokenKind::Eq)? { Some(self.parse_expr()?) } else { None };
            let end = self.expect(TokenKind::Semicolon)?;
            let decl = self.session.decls.alloc(Decl::new(DeclKind::Variable { name, ty, initializer }, Visibility::Unassigned, Modifiers::empty(), span(istart, end)));
            Some(self.session.stmts.alloc(Stmt::new(StmtKind::Decl(decl), span(istart, end))))
        } else {
            let e = self.parse_expr()?;
            let end = self.expect(TokenKind::Semicolon)?;
            Some(self.session.stmts.alloc(Stmt::new(StmtKind::Expr(e), span(start, end))))
        };
        let cond = if self.peek()? == TokenKind::Semicolon { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon)?;
        let step = if self.peek()? == TokenKind::RParen { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block_or_stmt()?;
        let end = self.current_end(start);
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::For { init, cond, step, body }, span(start, end))))
    }

    fn parse_switch(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("switch")?;
        self.expect(TokenKind::LParen)?;
        let discriminant = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while self.peek()? != TokenKind::RBrace {
            let is_default = self.eat_keyword("default")?;
            let mut values = Vec::new();
            if !is_default {
                self.expect_keyword("case")?;
                values.push(self.parse_expr()?);
                while self.eat(&TokenKind::Comma)? {
                    values.push(self.parse_expr()?);
                }
            }
            self.expect(TokenKind::Colon)?;
            let mut body = Vec::new();
            while !matches!(self.peek()?, TokenKind::Keyword(ref k) if k == "case" || k == "default") && self.peek()? != TokenKind::RBrace {
                body.push(self.parse_stmt()?);
            }
            cases.push(SwitchCase { is_default, values, body });
        }
        let end = self.expect(TokenKind::RBrace)?;
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Switch { discriminant, cases }, span(start, end))))
    }

    fn parse_break(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("break")?;
        let label = if matches!(self.peek()?, TokenKind::Identifier(_)) { Some(self.expect_identifier()?) } else { None };
        let end = self.expect(TokenKind::Semicolon)?;
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Break { label }, span(start, end))))
    }

    fn parse_continue(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("continue")?;
        let label = if matches!(self.peek()?, TokenKind::Identifier(_)) { Some(self.expect_identifier()?) } else { None };
        let end = self.expect(TokenKind::Semicolon)?;
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Continue { label }, span(start, end))))
    }

    fn parse_goto(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("goto")?;
        let label = self.expect_identifier()?;
        let end = self.expect(TokenKind::Semicolon)?;
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Goto { label }, span(start, end))))
    }

    fn parse_return(&mut self, start: SourceRange) -> PResult<StmtId> {
        self.expect_keyword("return")?;
        let value = if self.peek()? == TokenKind::Semicolon { None } else { Some(self.parse_expr()?) };
        let end = self.expect(TokenKind::Semicolon)?;
        Ok(self.session.stmts.alloc(Stmt::new(StmtKind::Return { value }, span(start, end))))
    }

    // ---------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------

    pub fn parse_expr(&mut self) -> PResult<ExprId> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<ExprId> {
        let lhs = self.parse_ternary()?;
        let op = match self.peek()? {
            TokenKind::Eq => BinOp::Assign,
            TokenKind::PlusEq => BinOp::AddAssign,
            TokenKind::MinusEq => BinOp::SubAssign,
            TokenKind::StarEq => BinOp::MulAssign,
            TokenKind::SlashEq => BinOp::DivAssign,
            TokenKind::PercentEq => BinOp::RemAssign,
            TokenKind::AmpEq => BinOp::AndAssign,
            TokenKind::PipeEq => BinOp::OrAssign,
            TokenKind::CaretEq => BinOp::XorAssign,
            _ => return Ok(lhs),
        };
        self.bump()?;
        let rhs = self.parse_assignment()?;
        let range = span(self.session.exprs.get(lhs).range, self.session.exprs.get(rhs).range);
        Ok(self.session.exprs.alloc(Expr::new(ExprKind::Binary { op, lhs, rhs }, range)))
    }

    fn parse_ternary(&mut self) -> PResult<ExprId> {
        let cond = self.parse_logical_or()?;
        if self.eat(&TokenKind::Question)? {
            let then_expr = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let else_expr = self.parse_assignment()?;
            let range = span(self.session.exprs.get(cond).range, self.session.exprs.get(else_expr).range);
            return Ok(self.session.exprs.alloc(Expr::new(ExprKind::Ternary { cond, then_expr, else_expr }, range)));
        }
        Ok(cond)
    }

    fn parse_logical_or(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_logical_and()?;
        while self.eat(&TokenKind::OrOr)? {
            let rhs = self.parse_logical_and()?;
            lhs = self.bin(BinOp::LogOr, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_bitor()?;
        while self.eat(&TokenKind::AndAnd)? {
            let rhs = self.parse_bitor()?;
            lhs = self.bin(BinOp::LogAnd, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_bitxor()?;
        while self.eat(&TokenKind::Pipe)? {
            let rhs = self.parse_bitxor()?;
            lhs = self.bin(BinOp::BitOr, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_bitand()?;
        while self.eat(&TokenKind::Caret)? {
            let rhs = self.parse_bitand()?;
            lhs = self.bin(BinOp::BitXor, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::Amp)? {
            let rhs = self.parse_equality()?;
            lhs = self.bin(BinOp::BitAnd, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek()? {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_relational()?;
            lhs = self.bin(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.peek()? {
                TokenKind::Less => BinOp::Lt,
                TokenKind::LessEq => BinOp::Le,
                TokenKind::TemplateEnd => BinOp::Gt,
                TokenKind::GreaterEq => BinOp::Ge,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_shift()?;
            lhs = self.bin(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek()? {
                TokenKind::LeftShift => BinOp::Shl,
                TokenKind::RightShift => BinOp::Shr,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_additive()?;
            lhs = self.bin(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek()? {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_multiplicative()?;
            lhs = self.bin(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_as_is_has()?;
        loop {
            let op = match self.peek()? {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => break,
            };
            self.bump()?;
            let rhs = self.parse_as_is_has()?;
            lhs = self.bin(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_as_is_has(&mut self) -> PResult<ExprId> {
        let mut lhs = self.parse_prefix()?;
        loop {
            if self.eat_keyword("as")? {
                let ty = self.parse_type()?;
                let range = self.session.exprs.get(lhs).range;
                lhs = self.session.exprs.alloc(Expr::new(ExprKind::As { value: lhs, ty }, range));
            } else if self.eat_keyword("is")? {
                let ty = self.parse_type()?;
                let range = self.session.exprs.get(lhs).range;
                lhs = self.session.exprs.alloc(Expr::new(ExprKind::Is { value: lhs, ty }, range));
            } else if self.eat_keyword("has")? {
                let clause = self.parse_has_clause()?;
                let range = self.session.exprs.get(lhs).range;
                lhs = self.session.exprs.alloc(Expr::new(ExprKind::Has { value: lhs, clause }, range));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_has_clause(&mut self) -> PResult<crate::ast::expr::HasClause> {
        use crate::ast::expr::HasClause;
        if self.eat_keyword("init")? {
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while self.peek()? != TokenKind::RParen {
                params.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            return Ok(HasClause::Init { params });
        }
        if self.eat_keyword("deinit")? {
            let virtual_required = self.eat_keyword("virtual")?;
            return Ok(HasClause::Deinit { virtual_required });
        }
        if self.eat_keyword("case")? {
            return Ok(HasClause::Case { name: self.expect_identifier()? });
        }
        if self.eat_keyword("var")? {
            let name = self.expect_identifier()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            return Ok(HasClause::Var { name, ty });
        }
        if self.eat_keyword("property")? {
            let name = self.expect_identifier()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            let (needs_get, needs_set) = self.parse_has_get_set()?;
            return Ok(HasClause::Property { name, ty, needs_get, needs_set });
        }
        if self.eat_keyword("subscript")? {
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while self.peek()? != TokenKind::RParen {
                params.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            self.expect(TokenKind::Minus)?;
            let _ = self.eat(&TokenKind::TemplateEnd)?;
            let ret = self.parse_type()?;
            let (needs_get, needs_set) = self.parse_has_get_set()?;
            return Ok(HasClause::Subscript { params, ret, needs_get, needs_set });
        }
        if self.eat_keyword("func")? {
            let name = self.expect_identifier()?;
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while self.peek()? != TokenKind::RParen {
                params.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            return Ok(HasClause::Func { name, params });
        }
        if self.eat_keyword("operator")? {
            let symbol_tok = self.bump()?;
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while self.peek()? != TokenKind::RParen {
                params.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            return Ok(HasClause::Operator { symbol: symbol_tok.kind.describe(), params });
        }
        if self.eat_keyword("call")? {
            self.expect(TokenKind::LParen)?;
            let mut params = Vec::new();
            while self.peek()? != TokenKind::RParen {
                params.push(self.parse_type()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            return Ok(HasClause::Call { params });
        }
        let ty = self.parse_type()?;
        Ok(HasClause::Trait(ty))
    }

    fn parse_has_get_set(&mut self) -> PResult<(bool, bool)> {
        if !self.eat(&TokenKind::LBrace)? {
            return Ok((true, false));
        }
        let mut needs_get = false;
        let mut needs_set = false;
        while self.peek()? != TokenKind::RBrace {
            if self.eat_keyword("get")? {
                needs_get = true;
            } else if self.eat_keyword("set")? {
                needs_set = true;
            } else {
                break;
            }
            let _ = self.eat(&TokenKind::Semicolon)?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok((needs_get, needs_set))
    }

    fn parse_prefix(&mut self) -> PResult<ExprId> {
        let start = self.peek_range()?;
        let op = match self.peek()? {
            TokenKind::Minus => Some(PrefixOp::Neg),
            TokenKind::Bang => Some(PrefixOp::Not),
            TokenKind::Tilde => Some(PrefixOp::BitNot),
            TokenKind::Star => Some(PrefixOp::Deref),
            TokenKind::Amp => Some(PrefixOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.bump()?;
            let operand = self.parse_prefix()?;
            let range = span(start, self.session.exprs.get(operand).range);
            return Ok(self.session.exprs.alloc(Expr::new(ExprKind::Prefix { op, operand }, range)));
        }
        self.parse_postfix()
    }

    fn bin(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        let range = span(self.session.exprs.get(lhs).range, self.session.exprs.get(rhs).range);
        self.session.exprs.alloc(Expr::new(ExprKind::Binary { op, lhs, rhs }, range))
    }

    fn parse_postfix(&mut self) -> PResult<ExprId> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek()? {
                TokenKind::Dot => {
                    self.bump()?;
                    let name = self.expect_identifier()?;
                    let range = span(self.session.exprs.get(expr).range, name.range);
                    expr = self.session.exprs.alloc(Expr::new(ExprKind::Member { base: expr, name, is_arrow: false }, range));
                }
                TokenKind::LParen => {
                    let args = self.parse_call_args()?;
                    let end = self.current_end(self.session.exprs.get(expr).range);
                    let range = span(self.session.exprs.get(expr).range, end);
                    expr = self.session.exprs.alloc(Expr::new(ExprKind::FunctionCall { callee: expr, args }, range));
                }
                TokenKind::LBracket => {
                    self.bump()?;
                    let mut args = Vec::new();
                    while self.peek()? != TokenKind::RBracket {
                        let value = self.parse_expr()?;
                        args.push(LabeledArgument { label: None, value });
                        if !self.eat(&TokenKind::Comma)? {
                            break;
                        }
                    }
                    let end = self.expect(TokenKind::RBracket)?;
                    let range = span(self.session.exprs.get(expr).range, end);
                    expr = self.session.exprs.alloc(Expr::new(ExprKind::SubscriptCall { base: expr, args }, range));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<Vec<LabeledArgument>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while self.peek()? != TokenKind::RParen {
            // `label: expr` or `_: expr` or bare `expr`.
            let label = if matches!(self.peek()?, TokenKind::Identifier(_)) {
                self.lexer.checkpoint();
                let id = self.expect_identifier()?;
                if self.peek()? == TokenKind::Colon {
                    self.bump()?;
                    self.lexer.commit();
                    Some(id)
                } else {
                    self.lexer.rewind();
                    None
                }
            } else {
                None
            };
            let value = self.parse_expr()?;
            args.push(LabeledArgument { label, value });
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<ExprId> {
        let tok = self.bump()?;
        let range = tok.range;
        match tok.kind {
            TokenKind::IntLiteral { text, suffix } => {
                let suffix = suffix.map(|(s, r)| Identifier::new(s, r));
                Ok(self.session.exprs.alloc(Expr::new(ExprKind::Literal(Literal::Integer { text, suffix }), range)))
            }
            TokenKind::FloatLiteral { text, suffix } => {
                let suffix = suffix.map(|(s, r)| Identifier::new(s, r));
                Ok(self.session.exprs.alloc(Expr::new(ExprKind::Literal(Literal::Float { text, suffix }), range)))
            }
            TokenKind::StringLiteral(s) => Ok(self.session.exprs.alloc(Expr::new(ExprKind::Literal(Literal::String(s)), range))),
            TokenKind::CharLiteral(c) => Ok(self.session.exprs.alloc(Expr::new(ExprKind::Literal(Literal::Char(c)), range))),
            TokenKind::Keyword(k) if k == "true" => Ok(self.session.exprs.alloc(Expr::new(ExprKind::SolvedConst(crate::ast::types::ConstValue::Bool(true)), range))),
            TokenKind::Keyword(k) if k == "false" => Ok(self.session.exprs.alloc(Expr::new(ExprKind::SolvedConst(crate::ast::types::ConstValue::Bool(false)), range))),
            TokenKind::Keyword(k) if k == "self" => Ok(self.session.exprs.alloc(Expr::new(ExprKind::CurrentSelf, range))),
            TokenKind::Identifier(name) => {
                let ident = Identifier::new(name, range);
                let args = self.parse_optional_template_args()?;
                Ok(self.session.exprs.alloc(Expr::new(ExprKind::Identifier { name: ident, template_args: args }, range)))
            }
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                let end = self.expect(TokenKind::RParen)?;
                Ok(self.session.exprs.alloc(Expr::new(ExprKind::Paren(inner), span(range, end))))
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                while self.peek()? != TokenKind::RBracket {
                    items.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma)? {
                        break;
                    }
                }
                let end = self.expect(TokenKind::RBracket)?;
                Ok(self.session.exprs.alloc(Expr::new(ExprKind::ArrayLiteral(items), span(range, end))))
            }
            TokenKind::Amp => {
                // Handled in parse_prefix normally; reachable only if a
                // caller consumed the token already. Treat as AddrOf.
                let operand = self.parse_prefix()?;
                Ok(self.session.exprs.alloc(Expr::new(ExprKind::Prefix { op: PrefixOp::AddrOf, operand }, range)))
            }
            other => Err(self.err(range, ErrorKind::UnexpectedToken(format!("expected expression, found {other:?}")))),
        }
    }
}

fn span(a: SourceRange, b: SourceRange) -> SourceRange {
    SourceRange::new(a.start, b.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one_decl(src: &str) -> (Session, DeclId) {
        let mut session = Session::new();
        let file;
        {
            let parser = Parser::new(src, "t.gulc", &mut session);
            file = parser.parse_file().unwrap();
        }
        let id = file.top_level[0];
        (session, id)
    }

    #[test]
    fn parses_empty_struct() {
        let (session, id) = parse_one_decl("struct Foo {}");
        match &session.decls.get(id).kind {
            DeclKind::Struct { name, members, .. } => {
                assert_eq!(name.name, "Foo");
                assert!(members.is_empty());
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn parses_template_struct_with_constraint() {
        let (session, id) = parse_one_decl("struct box<T: View> {}");
        match &session.decls.get(id).kind {
            DeclKind::TemplateStruct { name, params, .. } => {
                assert_eq!(name.name, "box");
                assert_eq!(params.len(), 1);
            }
            other => panic!("expected template struct, got {other:?}"),
        }
    }

    #[test]
    fn parses_import_with_alias() {
        let (session, id) = parse_one_decl("import std.io as io;");
        match &session.decls.get(id).kind {
            DeclKind::Import { path, alias, .. } => {
                assert_eq!(path.len(), 2);
                assert_eq!(alias.as_ref().unwrap().name, "io");
            }
            other => panic!("expected import, got {other:?}"),
        }
    }

    #[test]
    fn parses_function_with_params_and_body() {
        let (session, id) = parse_one_decl("func add(a: i32, b: i32) -> i32 { return a + b; }");
        match &session.decls.get(id).kind {
            DeclKind::Function { name, sig } => {
                assert_eq!(name.name, "add");
                assert_eq!(sig.params.len(), 2);
                assert!(sig.body.is_some());
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_has_init_expression() {
        let (session, id) = parse_one_decl("func f() { let x = i32 has init(a: i32); }");
        match &session.decls.get(id).kind {
            DeclKind::Function { sig, .. } => assert!(sig.body.is_some()),
            other => panic!("expected function, got {other:?}"),
        }
    }
}
