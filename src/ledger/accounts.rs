//! Simplified chart of accounts used by the posting rules.

use serde::{Deserialize, Serialize};

/// An account of the chart, identified by its dotted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Account {
    /// 1.1.2
    Estoques,
    /// 1.1.3
    Clientes,
    /// 1.1.9
    EncargosAcessorios,
    /// 1.2.1
    IcmsARecuperar,
    /// 2.1.1
    Fornecedores,
    /// 2.1.2
    IcmsARecolher,
    /// 3.1.1
    DespesaComServicos,
    /// 3.1.2
    CustoDeTransferencia,
    /// 3.2.1
    DescontosConcedidos,
    /// 4.1.1
    ReceitaDeVendas,
    /// 4.1.2
    DevolucoesDeVendas,
    /// 4.1.3
    ReceitaDeServicos,
    /// 4.1.4
    ReceitaDeTransferencia,
    /// 4.1.5
    ReceitasAcessorias,
    /// 4.2.1
    IcmsSobreVendas,
    /// 4.3.1
    DescontosObtidos,
}

const CHART: &[(Account, &str, &str)] = &[
    (Account::Estoques, "1.1.2", "Estoques"),
    (Account::Clientes, "1.1.3", "Clientes"),
    (Account::EncargosAcessorios, "1.1.9", "Encargos e Despesas Acessórias"),
    (Account::IcmsARecuperar, "1.2.1", "ICMS a Recuperar"),
    (Account::Fornecedores, "2.1.1", "Fornecedores"),
    (Account::IcmsARecolher, "2.1.2", "ICMS a Recolher"),
    (Account::DespesaComServicos, "3.1.1", "Despesa com Serviços"),
    (Account::CustoDeTransferencia, "3.1.2", "Custo de Transferência"),
    (Account::DescontosConcedidos, "3.2.1", "Descontos Concedidos"),
    (Account::ReceitaDeVendas, "4.1.1", "Receita de Vendas"),
    (Account::DevolucoesDeVendas, "4.1.2", "Devoluções de Vendas"),
    (Account::ReceitaDeServicos, "4.1.3", "Receita de Serviços"),
    (Account::ReceitaDeTransferencia, "4.1.4", "Receita de Transferência"),
    (Account::ReceitasAcessorias, "4.1.5", "Receitas Acessórias"),
    (Account::IcmsSobreVendas, "4.2.1", "ICMS sobre Vendas"),
    (Account::DescontosObtidos, "4.3.1", "Descontos Obtidos"),
];

impl Account {
    fn row(&self) -> (&'static str, &'static str) {
        CHART
            .iter()
            .find(|(a, _, _)| a == self)
            .map(|(_, code, label)| (*code, *label))
            .unwrap_or(("", ""))
    }

    /// Dotted account code, e.g. `1.1.2`.
    pub fn code(&self) -> &'static str {
        self.row().0
    }

    /// Account name, e.g. `Estoques`.
    pub fn label(&self) -> &'static str {
        self.row().1
    }

    /// `code label`, the form shown in reports.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.code(), self.label())
    }

    /// Every account in code order.
    pub fn all() -> impl Iterator<Item = Account> {
        CHART.iter().map(|(a, _, _)| *a)
    }
}

/// Look up an account by its dotted code.
pub fn account_by_code(code: &str) -> Option<Account> {
    CHART
        .iter()
        .find(|(_, c, _)| *c == code.trim())
        .map(|(a, _, _)| *a)
}
