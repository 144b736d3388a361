/// Reusable UI components

use yew::prelude::*;

use crate::operations::normalize_date;
use crate::transaction::Transaction;

#[derive(Properties, PartialEq)]
pub struct TransactionTableProps {
    pub rows: Vec<Transaction>,
    /// Amount and id only
    #[prop_or(false)]
    pub compact: bool,
}

#[function_component(TransactionTable)]
pub fn transaction_table(props: &TransactionTableProps) -> Html {
    if props.rows.is_empty() {
        return html! {
            <div class="empty-state">
                <p>{"No transactions to show."}</p>
                <p class="empty-state-hint">{"Open the transactions page and press Extract."}</p>
            </div>
        };
    }

    html! {
        <table class="transactions-table">
            <thead>
                <tr>
                    if !props.compact {
                        <>
                            <th>{"Customer"}</th>
                            <th>{"Date"}</th>
                        </>
                    }
                    <th>{"Amount"}</th>
                    <th>{"Transaction ID"}</th>
                </tr>
            </thead>
            <tbody>
                {for props.rows.iter().enumerate().map(|(i, tx)| html! {
                    <TransactionRow
                        key={format!("{}-{}", i, tx.transaction_id)}
                        tx={tx.clone()}
                        compact={props.compact}
                    />
                })}
            </tbody>
        </table>
    }
}

#[derive(Properties, PartialEq)]
struct TransactionRowProps {
    tx: Transaction,
    compact: bool,
}

#[function_component(TransactionRow)]
fn transaction_row(props: &TransactionRowProps) -> Html {
    let tx = &props.tx;
    let id_class = if tx.has_transaction_id() { "tx-id" } else { "tx-id missing-id" };

    html! {
        <tr>
            if !props.compact {
                <>
                    <td class="tx-customer">{&tx.customer}</td>
                    <td class="tx-date">{normalize_date(&tx.date)}</td>
                </>
            }
            <td class="tx-amount">{&tx.amount}</td>
            <td class={id_class}>{&tx.transaction_id}</td>
        </tr>
    }
}
