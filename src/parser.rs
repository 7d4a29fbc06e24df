//! The recursive-descent parser (§6.2): LR(1)-equivalent grammar with one
//! token of lookahead, Pratt-style expression parsing driven by the
//! precedence table in §6.2. Grounded on
//! `original_source/src/biron/parser.cpp`'s structure (a single-token
//! lookahead `Parser` driving `parse_expr(prec)`), adapted to Rill's own
//! item/stmt/type grammar (§3.2).

use smallvec::SmallVec;
use crate::ast::*;
use crate::cv::{FloatKind, IntKind};
use crate::diag::Sink;
use crate::lexer::{Lexer, Tok, Token};
use crate::source::Range;
use crate::symbol::{self, Symbol};

pub struct Parser<'u> {
  lx: Lexer<'u>,
  cur: Token,
  /// One token of extra lookahead, for the `ident ':'` vs bare-expression
  /// ambiguity in tuple/aggregate field lists.
  peeked: Option<Token>,
  unit: &'u Unit,
  diag: &'u mut Sink,
}

/// Parse one source file into a `Unit`, collecting diagnostics into `diag`.
pub fn parse_unit(source_name: String, source_text: String, diag: &mut Sink) -> Unit {
  let unit = Unit::new(source_name, source_text);
  diag.set_source(&unit.source_text);
  {
    let lx = Lexer::new(unit_text(&unit));
    let mut p = Parser { lx, cur: Token { kind: Tok::End, range: Range::new(0, 0) }, peeked: None, unit: &unit, diag };
    p.bump();
    p.parse_items();
  }
  unit
}

/// Workaround for borrowing `unit.source_text` for the same lifetime `unit`
/// itself is borrowed at in `parse_unit` above.
fn unit_text(unit: &Unit) -> &str { &unit.source_text }

impl<'u> Parser<'u> {
  fn bump(&mut self) -> Token {
    let prev = self.cur;
    self.cur = self.peeked.take().unwrap_or_else(|| self.lx.next());
    prev
  }
  fn peek_next(&mut self) -> Tok {
    if self.peeked.is_none() { self.peeked = Some(self.lx.next()) }
    self.peeked.expect("just set").kind
  }
  fn at(&self, k: Tok) -> bool { self.cur.kind == k }
  fn text(&self, r: Range) -> &str { self.lx.text(r) }

  fn eat(&mut self, k: Tok) -> Option<Token> { if self.at(k) { Some(self.bump()) } else { None } }

  fn expect(&mut self, k: Tok, what: &str) -> Token {
    if let Some(t) = self.eat(k) { return t }
    self.diag.error(self.cur.range, format!("expected {what}"));
    self.bump()
  }

  fn ident(&mut self) -> Symbol {
    let t = self.expect(Tok::Ident, "identifier");
    symbol::intern(self.text(t.range))
  }

  fn span(&self, start: Range, end: Range) -> Range { start.to(end) }

  // ---- items ----

  fn parse_items(&mut self) {
    while !self.at(Tok::End) {
      self.parse_item();
    }
  }

  fn parse_attrs(&mut self) -> Vec<AttrKind> {
    let mut attrs = Vec::new();
    while self.eat(Tok::At).is_some() {
      let name_tok = self.expect(Tok::Ident, "attribute name");
      let name = self.text(name_tok.range).to_owned();
      let mut args = Vec::new();
      if self.eat(Tok::LParen).is_some() {
        while !self.at(Tok::RParen) && !self.at(Tok::End) {
          args.push(self.bump());
          if self.eat(Tok::Comma).is_none() { break }
        }
        self.expect(Tok::RParen, "')'");
      }
      match name.as_str() {
        "section" => if let Some(&t) = args.first() { attrs.push(AttrKind::Section(symbol::intern(self.text(t.range)))) },
        "align" => if let Some(&t) = args.first() {
          if let Ok(n) = self.text(t.range).parse::<u64>() { attrs.push(AttrKind::Align(n)) }
        },
        "used" => attrs.push(AttrKind::Used),
        "export" => attrs.push(AttrKind::Export),
        _ => self.diag.warning(name_tok.range, format!("unknown attribute '{name}'")),
      }
    }
    attrs
  }

  fn parse_item(&mut self) {
    let attrs = self.parse_attrs();
    match self.cur.kind {
      Tok::KwModule => {
        let start = self.bump().range;
        let name = self.ident();
        let end = self.expect(Tok::Semi, "';'").range;
        self.unit.push_item(Item::Module(ModuleItem { name, range: self.span(start, end) }));
      }
      Tok::KwImport => {
        let start = self.bump().range;
        let t = self.expect(Tok::StrLit, "string literal");
        let path = symbol::intern(strip_quotes(self.text(t.range)));
        let end = self.expect(Tok::Semi, "';'").range;
        self.unit.push_item(Item::Import(ImportItem { path, range: self.span(start, end) }));
      }
      Tok::KwTypedef => {
        let start = self.bump().range;
        let name = self.ident();
        self.expect(Tok::Eq, "'='");
        let ty = self.parse_type();
        let end = self.expect(Tok::Semi, "';'").range;
        self.unit.push_item(Item::Typedef(TypedefItem { name, ty, range: self.span(start, end) }));
      }
      Tok::KwEffect => {
        let start = self.bump().range;
        let name = self.ident();
        self.expect(Tok::Eq, "'='");
        let ty = self.parse_type();
        let end = self.expect(Tok::Semi, "';'").range;
        self.unit.push_item(Item::Effect(EffectItem { name, ty, range: self.span(start, end) }));
      }
      Tok::KwLet => {
        let stmt = self.parse_let(true);
        self.unit.push_global(stmt);
      }
      Tok::KwFn => self.parse_fn(attrs),
      _ => {
        self.diag.error(self.cur.range, "expected an item");
        self.bump();
      }
    }
  }

  fn parse_fn(&mut self, attrs: Vec<AttrKind>) {
    let start = self.bump().range; // 'fn'
    let name = self.ident();
    self.expect(Tok::LParen, "'('");
    let mut params = Vec::new();
    while !self.at(Tok::RParen) && !self.at(Tok::End) {
      let pname = self.ident();
      self.expect(Tok::Colon, "':'");
      let ty = self.parse_type();
      params.push(Param { name: pname, ty });
      if self.eat(Tok::Comma).is_none() { break }
    }
    self.expect(Tok::RParen, "')'");
    let mut effects = Vec::new();
    if self.eat(Tok::Bang).is_some() {
      effects.push(self.parse_type());
      while self.eat(Tok::Comma).is_some() { effects.push(self.parse_type()) }
    }
    self.expect(Tok::Arrow, "'->'");
    let ret = self.parse_type();
    let (body, end) = if self.at(Tok::LBrace) {
      let b = self.parse_block();
      (Some(b), self.unit.stmt(b).range)
    } else {
      let t = self.expect(Tok::Semi, "';' or function body");
      (None, t.range)
    };
    self.unit.push_item(Item::Fn(FnItem { name, params, effects, ret, body, attrs, range: self.span(start, end) }));
  }

  // ---- types ----

  fn alloc_type(&mut self, kind: TypeKind, range: Range) -> TypeId { self.unit.types.allocate(TypeNode { kind, range }) }

  fn parse_type(&mut self) -> TypeId {
    let start = self.cur.range;
    match self.cur.kind {
      Tok::Ident if self.text(self.cur.range) == "bool" => { self.bump(); self.alloc_type(TypeKind::Bool, start) }
      Tok::Ident if self.text(self.cur.range) == "enum" => {
        self.bump();
        self.expect(Tok::LBrace, "'{'");
        let mut enumerators = SmallVec::<[(Symbol, Option<ExprId>); 8]>::new();
        while !self.at(Tok::RBrace) && !self.at(Tok::End) {
          let name = self.ident();
          let value = if self.eat(Tok::Eq).is_some() { Some(self.parse_expr(0)) } else { None };
          enumerators.push((name, value));
          if self.eat(Tok::Comma).is_none() { break }
        }
        let end = self.expect(Tok::RBrace, "'}'").range;
        self.alloc_type(TypeKind::Enum(enumerators), self.span(start, end))
      }
      Tok::Ident => { let t = self.bump(); self.alloc_type(TypeKind::Ident(symbol::intern(self.text(t.range))), start) }
      Tok::Ellipsis => { self.bump(); self.alloc_type(TypeKind::VarArgs, start) }
      Tok::Star => { self.bump(); let inner = self.parse_type(); self.alloc_type(TypeKind::Ptr(inner), start) }
      Tok::LBracket => {
        self.bump();
        if self.eat(Tok::RBracket).is_some() {
          let inner = self.parse_type();
          return self.alloc_type(TypeKind::Slice(inner), start)
        }
        let extent = self.parse_expr(0);
        self.expect(Tok::RBracket, "']'");
        let inner = self.parse_type();
        self.alloc_type(TypeKind::Array(inner, extent), start)
      }
      Tok::LParen => {
        self.bump();
        let mut fields = SmallVec::<[(Option<Symbol>, TypeId); 4]>::new();
        while !self.at(Tok::RParen) && !self.at(Tok::End) {
          let name = self.try_named_field();
          let ty = self.parse_type();
          fields.push((name, ty));
          if self.eat(Tok::Comma).is_none() { break }
        }
        let end = self.expect(Tok::RParen, "')'").range;
        self.alloc_type(TypeKind::Tuple(fields), self.span(start, end))
      }
      Tok::Pipe => {
        self.bump();
        let mut variants = SmallVec::<[TypeId; 4]>::new();
        variants.push(self.parse_type());
        while self.eat(Tok::Pipe).is_some() { variants.push(self.parse_type()) }
        self.alloc_type(TypeKind::Union(variants), start)
      }
      Tok::KwFn => {
        self.bump();
        let args = self.parse_args_type();
        let mut effects = SmallVec::<[TypeId; 2]>::new();
        if self.eat(Tok::Bang).is_some() {
          effects.push(self.parse_type());
          while self.eat(Tok::Comma).is_some() { effects.push(self.parse_type()) }
        }
        self.expect(Tok::Arrow, "'->'");
        let ret = self.parse_type();
        self.alloc_type(TypeKind::Fn { args, effects, ret }, start)
      }
      Tok::Dollar => {
        // `$T` spells the atomic wrapper `atomic<T>`.
        self.bump();
        let inner = self.parse_type();
        self.alloc_type(TypeKind::Atom(inner), start)
      }
      _ => {
        self.diag.error(start, "expected a type");
        self.alloc_type(TypeKind::Ident(symbol::intern("<error>")), start)
      }
    }
  }

  /// `ident ':'` lookahead for a named tuple/arg-list field. Leaves `cur`
  /// untouched when the identifier isn't actually followed by `:`, so the
  /// caller can still parse it as the start of a type/expression.
  /// `( (ident ':')? type , ... )`, as `TypeKind::Args` rather than `Tuple`
  /// so a function type's parameter names survive into the AST.
  fn parse_args_type(&mut self) -> TypeId {
    let start = self.expect(Tok::LParen, "'('").range;
    let mut fields = SmallVec::<[(Option<Symbol>, TypeId); 4]>::new();
    while !self.at(Tok::RParen) && !self.at(Tok::End) {
      let name = self.try_named_field();
      let ty = self.parse_type();
      fields.push((name, ty));
      if self.eat(Tok::Comma).is_none() { break }
    }
    let end = self.expect(Tok::RParen, "')'").range;
    self.alloc_type(TypeKind::Args(fields), self.span(start, end))
  }

  fn try_named_field(&mut self) -> Option<Symbol> {
    if self.at(Tok::Ident) && self.peek_next() == Tok::Colon {
      let t = self.bump();
      self.bump(); // ':'
      return Some(symbol::intern(self.text(t.range)))
    }
    None
  }

  // ---- statements ----

  fn alloc_stmt(&mut self, kind: StmtKind, range: Range) -> StmtId { self.unit.stmts.allocate(StmtNode { kind, range }) }

  fn parse_block(&mut self) -> StmtId {
    let start = self.expect(Tok::LBrace, "'{'").range;
    let mut stmts = SmallVec::<[StmtId; 8]>::new();
    while !self.at(Tok::RBrace) && !self.at(Tok::End) { stmts.push(self.parse_stmt()) }
    let end = self.expect(Tok::RBrace, "'}'").range;
    self.alloc_stmt(StmtKind::Block(stmts), self.span(start, end))
  }

  fn parse_let(&mut self, top_level: bool) -> StmtId {
    let start = self.bump().range; // 'let'
    let attrs = self.parse_attrs();
    let name = self.ident();
    let ty = if self.eat(Tok::Colon).is_some() { Some(self.parse_type()) } else { None };
    let init = if self.eat(Tok::Eq).is_some() { Some(self.parse_expr(0)) } else { None };
    let end = self.expect(Tok::Semi, "';'").range;
    let attrs_sv: SmallVec<[AttrKind; 2]> = attrs.into();
    let range = self.span(start, end);
    if top_level {
      let Some(init) = init else {
        self.diag.error(range, "top-level 'let' requires an initializer");
        return self.alloc_stmt(StmtKind::GLet { name, ty, init: self.error_expr(range), attrs: attrs_sv }, range)
      };
      self.alloc_stmt(StmtKind::GLet { name, ty, init, attrs: attrs_sv }, range)
    } else {
      self.alloc_stmt(StmtKind::Let { name, ty, init, attrs: attrs_sv }, range)
    }
  }

  fn error_expr(&mut self, range: Range) -> ExprId {
    self.unit.exprs.allocate(ExprNode { kind: ExprKind::Bool(false), range })
  }

  fn parse_stmt(&mut self) -> StmtId {
    let start = self.cur.range;
    match self.cur.kind {
      Tok::LBrace => self.parse_block(),
      Tok::KwReturn => {
        self.bump();
        let value = if self.at(Tok::Semi) { None } else { Some(self.parse_expr(0)) };
        let end = self.expect(Tok::Semi, "';'").range;
        self.alloc_stmt(StmtKind::Return(value), self.span(start, end))
      }
      Tok::KwBreak => { self.bump(); let end = self.expect(Tok::Semi, "';'").range; self.alloc_stmt(StmtKind::Break, self.span(start, end)) }
      Tok::KwContinue => { self.bump(); let end = self.expect(Tok::Semi, "';'").range; self.alloc_stmt(StmtKind::Continue, self.span(start, end)) }
      Tok::KwDefer => {
        self.bump();
        let inner = self.parse_stmt();
        self.alloc_stmt(StmtKind::Defer(inner), start)
      }
      Tok::KwLet => self.parse_let(false),
      Tok::KwUsing => {
        self.bump();
        let name = self.ident();
        self.expect(Tok::Colon, "':'");
        let ty = self.parse_type();
        let init = if self.eat(Tok::Eq).is_some() { Some(self.parse_expr(0)) } else { None };
        let end = self.expect(Tok::Semi, "';'").range;
        self.alloc_stmt(StmtKind::Using { name, ty, init }, self.span(start, end))
      }
      Tok::KwIf => self.parse_if(),
      Tok::KwFor => self.parse_for(),
      _ => self.parse_expr_or_assign_stmt(),
    }
  }

  fn parse_if(&mut self) -> StmtId {
    let start = self.bump().range; // 'if'
    let init = if self.at(Tok::KwLet) { Some(self.parse_let(false)) } else { None };
    let cond = self.parse_expr(0);
    let then = self.parse_block();
    let els = if self.eat(Tok::KwElse).is_some() {
      Some(if self.at(Tok::KwIf) { self.parse_if() } else { self.parse_block() })
    } else { None };
    let end = els.map_or_else(|| self.unit.stmt(then).range, |e| self.unit.stmt(e).range);
    self.alloc_stmt(StmtKind::If { init, cond, then, els }, self.span(start, end))
  }

  fn parse_for(&mut self) -> StmtId {
    let start = self.bump().range; // 'for'
    let (init, cond, post) = if self.at(Tok::LBrace) {
      (None, None, None)
    } else {
      let init = if self.at(Tok::Semi) { None } else if self.at(Tok::KwLet) { Some(self.parse_let(false)) } else { Some(self.parse_expr_or_assign_stmt()) };
      if init.is_none() { self.expect(Tok::Semi, "';'"); }
      let cond = if self.at(Tok::Semi) { None } else { Some(self.parse_expr(0)) };
      self.expect(Tok::Semi, "';'");
      let post = if self.at(Tok::LBrace) { None } else { Some(self.parse_expr_or_assign_stmt_no_semi()) };
      (init, cond, post)
    };
    let body = self.parse_block();
    let els = if self.eat(Tok::KwElse).is_some() { Some(self.parse_block()) } else { None };
    let end = els.map_or_else(|| self.unit.stmt(body).range, |e| self.unit.stmt(e).range);
    self.alloc_stmt(StmtKind::For { init, cond, post, body, els }, self.span(start, end))
  }

  fn parse_expr_or_assign_stmt(&mut self) -> StmtId {
    let id = self.parse_expr_or_assign_stmt_no_semi();
    self.expect(Tok::Semi, "';'");
    id
  }

  fn parse_expr_or_assign_stmt_no_semi(&mut self) -> StmtId {
    let start = self.cur.range;
    let lhs = self.parse_expr(0);
    let op = match self.cur.kind {
      Tok::Eq => Some(AssignOp::Assign),
      Tok::PlusEq => Some(AssignOp::AddAssign),
      Tok::MinusEq => Some(AssignOp::SubAssign),
      Tok::StarEq => Some(AssignOp::MulAssign),
      Tok::SlashEq => Some(AssignOp::DivAssign),
      _ => None,
    };
    if let Some(op) = op {
      self.bump();
      let rhs = self.parse_expr(0);
      let end = self.unit.expr(rhs).range;
      return self.alloc_stmt(StmtKind::Assign { op, lhs, rhs }, self.span(start, end))
    }
    let end = self.unit.expr(lhs).range;
    self.alloc_stmt(StmtKind::Expr(lhs), self.span(start, end))
  }

  // ---- expressions ----
  // Pratt parser over the §6.2 precedence table (higher binds tighter).

  fn alloc_expr(&mut self, kind: ExprKind, range: Range) -> ExprId { self.unit.exprs.allocate(ExprNode { kind, range }) }

  fn bin_prec(k: Tok) -> Option<(u8, BinOp)> {
    Some(match k {
      Tok::Star => (9, BinOp::Mul), Tok::Slash => (9, BinOp::Div),
      Tok::Plus => (8, BinOp::Add), Tok::Minus => (8, BinOp::Sub),
      Tok::Shl => (7, BinOp::Shl), Tok::Shr => (7, BinOp::Shr),
      Tok::Lt => (6, BinOp::Lt), Tok::Le => (6, BinOp::Le), Tok::Gt => (6, BinOp::Gt), Tok::Ge => (6, BinOp::Ge),
      Tok::EqEq => (5, BinOp::Eq), Tok::Ne => (5, BinOp::Ne),
      Tok::Amp => (4, BinOp::BitAnd),
      Tok::Pipe => (3, BinOp::BitOr),
      _ => return None,
    })
  }

  fn lbin_prec(k: Tok) -> Option<(u8, LBinOp)> {
    Some(match k { Tok::Amp2 => (2, LBinOp::And), Tok::Bar2 => (1, LBinOp::Or), _ => return None })
  }

  fn parse_expr(&mut self, min_prec: u8) -> ExprId {
    let mut lhs = self.parse_unary();
    loop {
      if self.at(Tok::KwAs) {
        self.bump();
        let ty = self.parse_type();
        let range = self.span(self.unit.expr(lhs).range, self.cur.range);
        lhs = self.alloc_expr(ExprKind::Cast { operand: lhs, ty }, range);
        continue
      }
      if self.at(Tok::KwIs) {
        self.bump();
        let ty = self.parse_type();
        let range = self.span(self.unit.expr(lhs).range, self.cur.range);
        lhs = self.alloc_expr(ExprKind::Test { operand: lhs, ty }, range);
        continue
      }
      if self.at(Tok::KwOf) {
        self.bump();
        let ty = self.parse_type();
        let prop = self.ident();
        let range = self.span(self.unit.expr(lhs).range, self.cur.range);
        lhs = self.alloc_expr(ExprKind::Prop { ty, prop }, range);
        continue
      }
      if let Some((prec, op)) = Self::bin_prec(self.cur.kind) {
        if prec < min_prec { break }
        self.bump();
        let rhs = self.parse_expr(prec + 1);
        let range = self.span(self.unit.expr(lhs).range, self.unit.expr(rhs).range);
        lhs = self.alloc_expr(ExprKind::Bin { op, lhs, rhs }, range);
        continue
      }
      if let Some((prec, op)) = Self::lbin_prec(self.cur.kind) {
        if prec < min_prec { break }
        self.bump();
        let rhs = self.parse_expr(prec + 1);
        let range = self.span(self.unit.expr(lhs).range, self.unit.expr(rhs).range);
        lhs = self.alloc_expr(ExprKind::LBin { op, lhs, rhs }, range);
        continue
      }
      break
    }
    lhs
  }

  fn parse_unary(&mut self) -> ExprId {
    let start = self.cur.range;
    let op = match self.cur.kind {
      Tok::Bang => Some(UnaryOp::Not),
      Tok::Minus => Some(UnaryOp::Neg),
      Tok::Star => Some(UnaryOp::Deref),
      Tok::Amp => Some(UnaryOp::Addr),
      _ => None,
    };
    if let Some(op) = op {
      self.bump();
      let operand = self.parse_unary();
      let range = self.span(start, self.unit.expr(operand).range);
      return self.alloc_expr(ExprKind::Unary { op, operand }, range)
    }
    if self.eat(Tok::Ellipsis).is_some() {
      let operand = self.parse_unary();
      let range = self.span(start, self.unit.expr(operand).range);
      return self.alloc_expr(ExprKind::Explode(operand), range)
    }
    self.parse_postfix()
  }

  fn parse_postfix(&mut self) -> ExprId {
    let mut e = self.parse_primary();
    loop {
      match self.cur.kind {
        Tok::LParen => {
          self.bump();
          let mut args = SmallVec::<[ExprId; 4]>::new();
          while !self.at(Tok::RParen) && !self.at(Tok::End) {
            args.push(self.parse_expr(0));
            if self.eat(Tok::Comma).is_none() { break }
          }
          let end = self.expect(Tok::RParen, "')'").range;
          let range = self.span(self.unit.expr(e).range, end);
          e = self.alloc_expr(ExprKind::Call { callee: e, args }, range);
        }
        Tok::LBracket => {
          self.bump();
          let index = self.parse_expr(0);
          let end = self.expect(Tok::RBracket, "']'").range;
          let range = self.span(self.unit.expr(e).range, end);
          e = self.alloc_expr(ExprKind::Index { base: e, index }, range);
        }
        Tok::Dot => {
          self.bump();
          let field_tok = self.expect(Tok::Ident, "field name");
          let field = symbol::intern(self.text(field_tok.range));
          let range = self.span(self.unit.expr(e).range, field_tok.range);
          e = self.alloc_expr(ExprKind::Access { base: e, field }, range);
        }
        Tok::Bang2 => {
          let t = self.bump();
          let range = self.span(self.unit.expr(e).range, t.range);
          e = self.alloc_expr(ExprKind::Eff(e), range);
        }
        _ => break,
      }
    }
    e
  }

  fn parse_primary(&mut self) -> ExprId {
    let start = self.cur.range;
    match self.cur.kind {
      Tok::KwTrue => { self.bump(); self.alloc_expr(ExprKind::Bool(true), start) }
      Tok::KwFalse => { self.bump(); self.alloc_expr(ExprKind::Bool(false), start) }
      Tok::Question => { self.bump(); self.alloc_expr(ExprKind::InferSize, start) }
      Tok::IntLit => { let t = self.bump(); self.parse_int_lit(t) }
      Tok::FloatLit => { let t = self.bump(); self.parse_float_lit(t) }
      Tok::StrLit => { let t = self.bump(); self.alloc_expr(ExprKind::Str(symbol::intern(strip_quotes(self.text(t.range)))), t.range) }
      Tok::Ident => {
        let t = self.bump();
        let name = symbol::intern(self.text(t.range));
        if self.at(Tok::Colon) && self.peek_next() == Tok::Colon {
          self.bump();
          self.bump();
          let member = self.ident();
          return self.alloc_expr(ExprKind::Selector(name, member), self.span(t.range, self.cur.range))
        }
        if self.at(Tok::LBrace) { return self.parse_agg(name, t.range) }
        self.alloc_expr(ExprKind::Var(name), t.range)
      }
      Tok::LParen => {
        self.bump();
        let mut elems = SmallVec::<[ExprId; 4]>::new();
        while !self.at(Tok::RParen) && !self.at(Tok::End) {
          elems.push(self.parse_expr(0));
          if self.eat(Tok::Comma).is_none() { break }
        }
        let end = self.expect(Tok::RParen, "')'").range;
        self.alloc_expr(ExprKind::Tuple(elems), self.span(start, end))
      }
      _ => {
        self.diag.error(start, "expected an expression");
        self.bump();
        self.alloc_expr(ExprKind::Bool(false), start)
      }
    }
  }

  fn parse_agg(&mut self, name: Symbol, start: Range) -> ExprId {
    self.bump(); // '{'
    let ty = self.alloc_type(TypeKind::Ident(name), start);
    let mut fields = SmallVec::<[(Option<Symbol>, ExprId); 4]>::new();
    while !self.at(Tok::RBrace) && !self.at(Tok::End) {
      let field_name = self.try_named_field();
      let value = self.parse_expr(0);
      fields.push((field_name, value));
      if self.eat(Tok::Comma).is_none() { break }
    }
    let end = self.expect(Tok::RBrace, "'}'").range;
    self.alloc_expr(ExprKind::Agg { ty, fields }, self.span(start, end))
  }

  fn parse_int_lit(&mut self, t: Token) -> ExprId {
    let text = self.text(t.range);
    let (digits, suffix) = split_suffix(text);
    let value = parse_int_literal(digits);
    let suffix = suffix.and_then(int_suffix_kind);
    self.alloc_expr(ExprKind::Int { value, suffix }, t.range)
  }

  fn parse_float_lit(&mut self, t: Token) -> ExprId {
    let text = self.text(t.range);
    let (digits, suffix) = split_suffix(text);
    let value = digits.parse::<f64>().unwrap_or(0.0);
    let suffix = suffix.and_then(float_suffix_kind);
    self.alloc_expr(ExprKind::Flt { value, suffix }, t.range)
  }
}

fn strip_quotes(s: &str) -> &str { s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s) }

fn split_suffix(text: &str) -> (&str, Option<&str>) {
  if let Some(pos) = text.rfind('_') {
    if pos > 0 { return (&text[..pos], Some(&text[pos + 1..])) }
  }
  (text, None)
}

fn int_suffix_kind(s: &str) -> Option<IntKind> {
  Some(match s {
    "u8" => IntKind::U8, "u16" => IntKind::U16, "u32" => IntKind::U32, "u64" => IntKind::U64,
    "s8" => IntKind::S8, "s16" => IntKind::S16, "s32" => IntKind::S32, "s64" => IntKind::S64,
    _ => return None,
  })
}

fn float_suffix_kind(s: &str) -> Option<FloatKind> {
  Some(match s { "f32" => FloatKind::F32, "f64" => FloatKind::F64, _ => return None })
}

fn parse_int_literal(digits: &str) -> i128 {
  if let Some(rest) = digits.strip_prefix("0x") { return i128::from_str_radix(rest, 16).unwrap_or(0) }
  if let Some(rest) = digits.strip_prefix("0b") { return i128::from_str_radix(rest, 2).unwrap_or(0) }
  digits.parse::<i128>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diag::Sink;

  fn parse(src: &str) -> (Unit, Sink) {
    let mut diag = Sink::new();
    let unit = parse_unit("t.rl".into(), src.into(), &mut diag);
    (unit, diag)
  }

  #[test]
  fn parses_simple_function() {
    let (unit, diag) = parse("fn add(a: s32, b: s32) -> s32 { return a + b; }");
    assert!(!diag.had_error());
    assert_eq!(unit.items().len(), 1);
  }

  #[test]
  fn parses_global_let_and_typedef() {
    let (unit, diag) = parse("typedef Pair = (s32, s32); let x: s32 = 1 + 2;");
    assert!(!diag.had_error());
    assert_eq!(unit.items().len(), 1);
    assert_eq!(unit.globals().len(), 1);
  }

  #[test]
  fn parses_if_for_defer() {
    let (_unit, diag) = parse("fn f() -> () { if true { } else { } for { break; } defer f(); return; }");
    assert!(!diag.had_error());
  }

  #[test]
  fn operator_precedence_matches_table() {
    let (unit, diag) = parse("fn f() -> s32 { return 1 + 2 * 3; }");
    assert!(!diag.had_error());
    // body -> Block[Return(Bin(Add, 1, Bin(Mul, 2, 3)))]
    let f = match &unit.items()[0] { Item::Fn(f) => f.body.unwrap(), _ => panic!() };
    let StmtKind::Block(stmts) = &unit.stmt(f).kind else { panic!() };
    let StmtKind::Return(Some(ret)) = &unit.stmt(stmts[0]).kind else { panic!() };
    let ExprKind::Bin { op: BinOp::Add, rhs, .. } = &unit.expr(*ret).kind else { panic!("expected top-level add") };
    assert!(matches!(unit.expr(*rhs).kind, ExprKind::Bin { op: BinOp::Mul, .. }));
  }
}
