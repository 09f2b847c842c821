//! Shared fixtures for the integration tests.
//!
//! A small legacy Delphi project (a form, a calculation unit, a data module)
//! and its partial Java/Spring rewrite.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use modernize::build_project_facts;
use modernize_core::config::ExtractorConfig;
use modernize_core::facts::ProjectFacts;

pub const CLIENTES_PAS: &str = r#"unit uClientes;

interface

uses
  Windows, SysUtils, Forms, Controls, StdCtrls, DB, ADODB;

type
  TClienteForm = class(TForm)
    btnSalvar: TButton;
    qryClientes: TADOQuery;
    procedure btnSalvarClick(Sender: TObject);
  private
    function Validar: Boolean;
  end;

var
  ClienteForm: TClienteForm;

implementation

{$R *.dfm}

procedure TClienteForm.btnSalvarClick(Sender: TObject);
begin
  if Validar then
  begin
    qryClientes.SQL.Text := 'INSERT INTO CLIENTES (NOME) VALUES (:NOME)';
    qryClientes.ExecSQL;
  end;
end;

function TClienteForm.Validar: Boolean;
begin
  Result := True;
end;

end.
"#;

pub const CALCULOS_PAS: &str = r#"unit uCalculos;

interface

procedure CalcularTotal;
procedure CalculaImpostoEspecial(Valor: Currency; Aliquota: Double);

implementation

procedure CalcularTotal;
begin
end;

procedure CalculaImpostoEspecial(Valor: Currency; Aliquota: Double);
begin
  if Aliquota > 0 then
    Valor := Valor * Aliquota;
end;

end.
"#;

pub const DADOS_PAS: &str = r#"unit dmDados;

interface

uses
  SysUtils, Classes, DB, ADODB;

type
  TdmDados = class(TDataModule)
    conPrincipal: TADOConnection;
    qryPedidos: TADOQuery;
  public
    procedure AbrirPedidos;
  end;

implementation

procedure TdmDados.AbrirPedidos;
begin
  qryPedidos.SQL.Text := 'SELECT * FROM PEDIDOS';
  qryPedidos.Open;
end;

end.
"#;

pub const CLIENTE_CONTROLLER_JAVA: &str = r#"package com.acme.clientes;

import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("/clientes")
public class ClienteController {

    @PostMapping
    public void SalvarHandler() {
    }
}
"#;

pub const CALCULO_SERVICE_JAVA: &str = r#"package com.acme.calculos;

import org.springframework.stereotype.Service;

@Service
public class CalculoService {

    public void calcularTotal() {
    }
}
"#;

pub const PEDIDO_JAVA: &str = r#"package com.acme.pedidos;

@Entity
@Table(name = "PEDIDOS")
public class Pedido {
    @Id
    private Long id;
}
"#;

pub const PEDIDO_REPOSITORY_JAVA: &str = r#"package com.acme.pedidos;

public interface PedidoRepository extends JpaRepository<Pedido, Long> {
}
"#;

fn owned(files: &[(&str, &str)]) -> Vec<(String, String)> {
    files
        .iter()
        .map(|(path, text)| (path.to_string(), text.to_string()))
        .collect()
}

/// The legacy project as `(path, text)` pairs.
pub fn source_files() -> Vec<(String, String)> {
    owned(&[
        ("src/uClientes.pas", CLIENTES_PAS),
        ("src/uCalculos.pas", CALCULOS_PAS),
        ("src/dmDados.pas", DADOS_PAS),
    ])
}

/// The rewrite as `(path, text)` pairs.
pub fn target_files() -> Vec<(String, String)> {
    owned(&[
        ("src/main/java/com/acme/clientes/ClienteController.java", CLIENTE_CONTROLLER_JAVA),
        ("src/main/java/com/acme/calculos/CalculoService.java", CALCULO_SERVICE_JAVA),
        ("src/main/java/com/acme/pedidos/Pedido.java", PEDIDO_JAVA),
        ("src/main/java/com/acme/pedidos/PedidoRepository.java", PEDIDO_REPOSITORY_JAVA),
    ])
}

pub fn facts(files: &[(String, String)]) -> ProjectFacts {
    build_project_facts(files, &ExtractorConfig::default())
}

/// Write `files` below `root`, creating parent directories.
pub fn write_tree(root: &Path, files: &[(String, String)]) {
    for (path, text) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&full, text).expect("write fixture");
    }
}
