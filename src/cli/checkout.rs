use clap::{Args, ValueEnum};
use tally::checkout::{CustomerInfo, DocumentType, PaymentMethod};
use uuid::Uuid;

use super::{Service, print_line};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PaymentArg {
    Pix,
    Bitcoin,
    Usdt,
    Github,
}

impl From<PaymentArg> for PaymentMethod {
    fn from(arg: PaymentArg) -> Self {
        match arg {
            PaymentArg::Pix => PaymentMethod::Pix,
            PaymentArg::Bitcoin => PaymentMethod::Bitcoin,
            PaymentArg::Usdt => PaymentMethod::Usdt,
            PaymentArg::Github => PaymentMethod::Github,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DocumentArg {
    Cpf,
    Cnpj,
}

impl From<DocumentArg> for DocumentType {
    fn from(arg: DocumentArg) -> Self {
        match arg {
            DocumentArg::Cpf => DocumentType::Cpf,
            DocumentArg::Cnpj => DocumentType::Cnpj,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct CheckoutArgs {
    /// Customer full name
    #[arg(long)]
    name: String,

    /// Customer email
    #[arg(long)]
    email: String,

    /// Customer phone
    #[arg(long)]
    phone: Option<String>,

    /// Taxpayer document number
    #[arg(long, requires = "document_type")]
    document: Option<String>,

    /// Kind of taxpayer document
    #[arg(long, value_enum, requires = "document")]
    document_type: Option<DocumentArg>,

    /// How the customer will pay
    #[arg(long, value_enum)]
    payment_method: Option<PaymentArg>,
}

#[derive(Debug, Args)]
pub(crate) struct CompleteArgs {
    /// Checkout session id
    session_id: Uuid,
}

pub(crate) fn open(service: &mut Service, args: CheckoutArgs) -> Result<(), String> {
    let customer = CustomerInfo {
        phone: args.phone,
        document: args.document,
        document_type: args.document_type.map(DocumentType::from),
        ..CustomerInfo::new(args.name, args.email)
    };

    let session = service
        .create_checkout_session(customer, None, args.payment_method.map(PaymentMethod::from))
        .map_err(|error| error.to_string())?;

    let currency = session.currency;

    print_line(&format!("session_id: {}", session.id))?;
    print_line(&format!("total: {}", currency.format(session.total)))?;
    print_line(&format!("expires_at: {}", session.expires_at))
}

pub(crate) fn complete(service: &mut Service, args: &CompleteArgs) -> Result<(), String> {
    let session = service
        .complete_checkout(args.session_id)
        .map_err(|error| error.to_string())?;

    print_line(&format!("session {} {}", session.id, session.status))
}
